//! Template compilation.
//!
//! Compilation walks a static structure once, resolving per-element
//! namespaces and classification flags from the engine configuration,
//! normalizing static whitespace, and validating that the slot indices
//! form a contiguous, duplicate-free range. The result is a [`Template`]:
//! an immutable description the renderer instantiates against concrete
//! values any number of times.
//!
//! The engine caches compiled templates (and compile failures) by
//! [`TemplateId`], so compilation happens exactly once per distinct
//! structure.

use std::rc::Rc;

use tracing::debug;

use crate::config::{EngineConfig, TagFlags};
use crate::error::CompileError;

use super::whitespace;
use super::{AttrName, AttrValue, AttrChunk, ElementNode, StaticChild, StaticRoot, Structure, TemplateId};

// =============================================================================
// Compiled representation
// =============================================================================

/// What kind of position a slot occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    AttributeName,
    AttributeValue,
    MixedAttribute,
    Child,
}

/// One piece of a mixed attribute value.
#[derive(Debug, Clone)]
pub enum MixedPart {
    Literal(Rc<str>),
    Slot(usize),
}

/// A compiled attribute entry.
#[derive(Debug, Clone)]
pub enum CompiledAttr {
    /// Fully static; applied once at build time.
    Static { name: Rc<str>, value: Rc<str> },
    /// The value is a slot; an editor re-applies it on every update.
    ValueSlot { name: Rc<str>, index: usize },
    /// The name is a slot; the paired static value is applied under
    /// whatever name (or map spread) the value provides.
    NameSlot { index: usize, value: Rc<str> },
    /// Literal text with embedded slots, re-concatenated on update.
    Mixed { name: Rc<str>, parts: Rc<[MixedPart]> },
}

/// A compiled child position.
#[derive(Debug, Clone)]
pub enum CompiledChild {
    Text(Rc<str>),
    Comment(Rc<str>),
    Slot(usize),
    Element(CompiledNode),
}

/// A compiled element descriptor.
#[derive(Debug, Clone)]
pub struct CompiledNode {
    pub tag: Rc<str>,
    pub namespace: Option<Rc<str>>,
    pub flags: TagFlags,
    pub attributes: Vec<CompiledAttr>,
    pub children: Vec<CompiledChild>,
}

/// The root of a compiled template.
#[derive(Debug, Clone)]
pub enum CompiledRoot {
    Element(CompiledNode),
    Fragment(Vec<CompiledChild>),
}

/// A compiled, cached template.
#[derive(Debug)]
pub struct Template {
    id: TemplateId,
    root: CompiledRoot,
    slots: Vec<SlotKind>,
}

impl Template {
    /// The identity of the structure this template was compiled from.
    pub fn id(&self) -> TemplateId {
        self.id
    }

    /// The compiled root.
    pub fn root(&self) -> &CompiledRoot {
        &self.root
    }

    /// Number of value slots the template expects.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// The kind of position a slot occupies.
    pub fn slot_kind(&self, index: usize) -> Option<SlotKind> {
        self.slots.get(index).copied()
    }
}

// =============================================================================
// Compilation
// =============================================================================

struct SlotCollector {
    seen: Vec<Option<SlotKind>>,
    duplicate: Option<usize>,
}

impl SlotCollector {
    fn new() -> Self {
        Self {
            seen: Vec::new(),
            duplicate: None,
        }
    }

    fn record(&mut self, index: usize, kind: SlotKind) {
        if self.seen.len() <= index {
            self.seen.resize(index + 1, None);
        }
        if self.seen[index].is_some() && self.duplicate.is_none() {
            self.duplicate = Some(index);
        }
        self.seen[index] = Some(kind);
    }

    fn finish(self) -> Result<Vec<SlotKind>, CompileError> {
        if let Some(index) = self.duplicate {
            return Err(CompileError::DuplicateSlot { index });
        }
        let count = self.seen.len();
        self.seen
            .into_iter()
            .enumerate()
            .map(|(index, kind)| kind.ok_or(CompileError::MissingSlot { index, count }))
            .collect()
    }
}

/// Compile a static structure against a configuration.
///
/// Idempotent per structure; the engine caches the result by identity.
pub fn compile(structure: &Structure, config: &EngineConfig) -> Result<Template, CompileError> {
    let mut slots = SlotCollector::new();

    let root = match &structure.root {
        StaticRoot::Element(node) => CompiledRoot::Element(compile_element(node, config, &mut slots)),
        StaticRoot::Fragment(children) => {
            if children.is_empty() {
                return Err(CompileError::EmptyFragment);
            }
            let mut compiled = compile_children(children, config, &mut slots);
            whitespace::normalize_text(&mut compiled, TagFlags::empty());
            CompiledRoot::Fragment(compiled)
        }
    };

    let slots = slots.finish()?;
    debug!(template = %structure.id(), slots = slots.len(), "compiled template");

    Ok(Template {
        id: structure.id(),
        root,
        slots,
    })
}

fn compile_element(node: &ElementNode, config: &EngineConfig, slots: &mut SlotCollector) -> CompiledNode {
    let mut flags = config.flags_for(&node.tag);
    let namespace = node
        .namespace
        .as_deref()
        .or_else(|| config.namespace_for(&node.tag))
        .map(Rc::from);
    if namespace.is_some() {
        flags |= TagFlags::NAMESPACED;
    }

    let mut attributes = Vec::with_capacity(node.attributes.len());
    for entry in &node.attributes {
        let compiled = match (&entry.name, &entry.value) {
            (AttrName::Slot(index), value) => {
                slots.record(*index, SlotKind::AttributeName);
                let value = match value {
                    AttrValue::Literal(text) => Rc::from(text.as_str()),
                    // A slotted name never pairs with a slotted value; the
                    // front end emits separate entries for those.
                    _ => Rc::from(""),
                };
                CompiledAttr::NameSlot {
                    index: *index,
                    value,
                }
            }
            (AttrName::Literal(name), AttrValue::Literal(value)) => CompiledAttr::Static {
                name: Rc::from(name.as_str()),
                value: Rc::from(value.as_str()),
            },
            (AttrName::Literal(name), AttrValue::Slot(index)) => {
                slots.record(*index, SlotKind::AttributeValue);
                CompiledAttr::ValueSlot {
                    name: Rc::from(name.as_str()),
                    index: *index,
                }
            }
            (AttrName::Literal(name), AttrValue::Mixed(chunks)) => {
                let parts: Vec<MixedPart> = chunks
                    .iter()
                    .map(|chunk| match chunk {
                        AttrChunk::Literal(text) => MixedPart::Literal(Rc::from(text.as_str())),
                        AttrChunk::Slot(index) => {
                            slots.record(*index, SlotKind::MixedAttribute);
                            MixedPart::Slot(*index)
                        }
                    })
                    .collect();
                CompiledAttr::Mixed {
                    name: Rc::from(name.as_str()),
                    parts: parts.into(),
                }
            }
        };
        attributes.push(compiled);
    }

    let mut children = compile_children(&node.children, config, slots);
    whitespace::normalize_text(&mut children, flags);

    CompiledNode {
        tag: Rc::from(node.tag.as_str()),
        namespace,
        flags,
        attributes,
        children,
    }
}

fn compile_children(
    children: &[StaticChild],
    config: &EngineConfig,
    slots: &mut SlotCollector,
) -> Vec<CompiledChild> {
    children
        .iter()
        .map(|child| match child {
            StaticChild::Text(text) => CompiledChild::Text(Rc::from(text.as_str())),
            StaticChild::Comment(text) => CompiledChild::Comment(Rc::from(text.as_str())),
            StaticChild::Slot(index) => {
                slots.record(*index, SlotKind::Child);
                CompiledChild::Slot(*index)
            }
            StaticChild::Element(node) => CompiledChild::Element(compile_element(node, config, slots)),
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
