//! Static structures and compiled templates.
//!
//! A [`Structure`] is the already-parsed static description of a subtree:
//! tags, attributes and children, with dynamic positions marked by slot
//! indices. The tagged-template front end that produces structures from
//! literal markup lives outside this crate; tests and embedders build them
//! directly through the [`element`]/[`fragment`] builders.
//!
//! Identity, not content, is what the engine caches by: every structure
//! gets a unique [`TemplateId`] at construction, and callers share one
//! `Rc<Structure>` per distinct template source. Two structurally identical
//! structures built separately are distinct templates.

mod compiler;
mod whitespace;

pub use compiler::{
    compile, CompiledAttr, CompiledChild, CompiledNode, CompiledRoot, MixedPart, SlotKind,
    Template,
};

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Template identity
// =============================================================================

static NEXT_TEMPLATE_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a static structure.
///
/// Assigned once when the structure is built; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateId(u64);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Static structure
// =============================================================================

/// An attribute name position: literal or slotted.
#[derive(Debug, Clone)]
pub enum AttrName {
    Literal(String),
    Slot(usize),
}

/// An attribute value position: literal, a single slot, or literal text
/// with embedded slots (concatenated on every update).
#[derive(Debug, Clone)]
pub enum AttrValue {
    Literal(String),
    Slot(usize),
    Mixed(Vec<AttrChunk>),
}

/// One piece of a mixed attribute value.
#[derive(Debug, Clone)]
pub enum AttrChunk {
    Literal(String),
    Slot(usize),
}

impl AttrChunk {
    /// Literal chunk.
    pub fn literal(text: &str) -> Self {
        AttrChunk::Literal(text.to_string())
    }

    /// Slot chunk.
    pub fn slot(index: usize) -> Self {
        AttrChunk::Slot(index)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AttrEntry {
    pub(crate) name: AttrName,
    pub(crate) value: AttrValue,
}

/// A child position in a static structure.
#[derive(Debug, Clone)]
pub(crate) enum StaticChild {
    Text(String),
    Comment(String),
    Slot(usize),
    Element(ElementNode),
}

/// A static element description under construction.
///
/// # Example
///
/// ```ignore
/// use quilt::template::element;
///
/// // <div class="greeting"><span>Hello <slot 0>!</span></div>
/// let structure = element("div")
///     .attribute("class", "greeting")
///     .child(element("span").text("Hello ").slot(0).text("!"))
///     .into_structure();
/// ```
#[derive(Debug, Clone)]
pub struct ElementNode {
    pub(crate) tag: String,
    pub(crate) namespace: Option<String>,
    pub(crate) attributes: Vec<AttrEntry>,
    pub(crate) children: Vec<StaticChild>,
}

/// Start building an element.
pub fn element(tag: &str) -> ElementNode {
    ElementNode {
        tag: tag.to_string(),
        namespace: None,
        attributes: Vec::new(),
        children: Vec::new(),
    }
}

impl ElementNode {
    /// Create the element in an explicit namespace (overrides the
    /// engine's tag table).
    pub fn namespace(mut self, uri: &str) -> Self {
        self.namespace = Some(uri.to_string());
        self
    }

    /// Static attribute.
    pub fn attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.push(AttrEntry {
            name: AttrName::Literal(name.to_string()),
            value: AttrValue::Literal(value.to_string()),
        });
        self
    }

    /// Attribute whose value is a single slot.
    pub fn attribute_slot(mut self, name: &str, index: usize) -> Self {
        self.attributes.push(AttrEntry {
            name: AttrName::Literal(name.to_string()),
            value: AttrValue::Slot(index),
        });
        self
    }

    /// Attribute whose name is a slot (a text value names one attribute;
    /// an attribute map spreads).
    pub fn attribute_name_slot(mut self, index: usize) -> Self {
        self.attributes.push(AttrEntry {
            name: AttrName::Slot(index),
            value: AttrValue::Literal(String::new()),
        });
        self
    }

    /// Attribute whose value is literal text with embedded slots.
    pub fn attribute_parts(mut self, name: &str, parts: Vec<AttrChunk>) -> Self {
        self.attributes.push(AttrEntry {
            name: AttrName::Literal(name.to_string()),
            value: AttrValue::Mixed(parts),
        });
        self
    }

    /// Static text child.
    pub fn text(mut self, text: &str) -> Self {
        self.children.push(StaticChild::Text(text.to_string()));
        self
    }

    /// Comment child.
    pub fn comment(mut self, text: &str) -> Self {
        self.children.push(StaticChild::Comment(text.to_string()));
        self
    }

    /// Dynamic child slot.
    pub fn slot(mut self, index: usize) -> Self {
        self.children.push(StaticChild::Slot(index));
        self
    }

    /// Nested element child.
    pub fn child(mut self, child: ElementNode) -> Self {
        self.children.push(StaticChild::Element(child));
        self
    }

    /// Finish the structure with this element as root.
    pub fn into_structure(self) -> Rc<Structure> {
        Structure::new(StaticRoot::Element(self))
    }
}

/// A fragment (multi-root) structure under construction.
#[derive(Debug, Clone, Default)]
pub struct FragmentNode {
    pub(crate) children: Vec<StaticChild>,
}

/// Start building a fragment-rooted structure.
pub fn fragment() -> FragmentNode {
    FragmentNode::default()
}

impl FragmentNode {
    /// Static text child.
    pub fn text(mut self, text: &str) -> Self {
        self.children.push(StaticChild::Text(text.to_string()));
        self
    }

    /// Comment child.
    pub fn comment(mut self, text: &str) -> Self {
        self.children.push(StaticChild::Comment(text.to_string()));
        self
    }

    /// Dynamic child slot.
    pub fn slot(mut self, index: usize) -> Self {
        self.children.push(StaticChild::Slot(index));
        self
    }

    /// Element child.
    pub fn child(mut self, child: ElementNode) -> Self {
        self.children.push(StaticChild::Element(child));
        self
    }

    /// Finish the structure with fragment children as roots.
    pub fn into_structure(self) -> Rc<Structure> {
        Structure::new(StaticRoot::Fragment(self.children))
    }
}

#[derive(Debug, Clone)]
pub(crate) enum StaticRoot {
    Element(ElementNode),
    Fragment(Vec<StaticChild>),
}

/// An immutable static structure with its identity.
#[derive(Debug)]
pub struct Structure {
    id: TemplateId,
    pub(crate) root: StaticRoot,
}

impl Structure {
    fn new(root: StaticRoot) -> Rc<Self> {
        Rc::new(Self {
            id: TemplateId(NEXT_TEMPLATE_ID.fetch_add(1, Ordering::Relaxed)),
            root,
        })
    }

    /// The structure's identity.
    pub fn id(&self) -> TemplateId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_per_structure() {
        let a = element("div").into_structure();
        let b = element("div").into_structure();
        assert_ne!(
            a.id(),
            b.id(),
            "structurally identical templates built separately are distinct"
        );
        assert_eq!(a.id(), a.id());
    }

    #[test]
    fn test_builder_shape() {
        let structure = element("div")
            .attribute("class", "hero")
            .attribute_slot("title", 0)
            .child(element("span").text("Hello ").slot(1))
            .into_structure();

        let StaticRoot::Element(root) = &structure.root else {
            panic!("expected element root");
        };
        assert_eq!(root.tag, "div");
        assert_eq!(root.attributes.len(), 2);
        assert_eq!(root.children.len(), 1);
    }
}
