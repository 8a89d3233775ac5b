//! In-memory host tree - the reference adapter.
//!
//! Nodes live in a slab of records addressed by slot index, with a free
//! pool for O(1) reuse and a generation counter packed into each handle so
//! a recycled slot never aliases a stale [`NodeId`]. Tree mutation follows
//! DOM rules: a node has at most one parent, attaching detaches first, and
//! fragments move their children on insertion.
//!
//! Beyond the [`HostTree`] trait the adapter keeps an operation log
//! (`ops`) recording every mutating call in order, which tests use to
//! observe editor application order, plus HTML-ish snapshot helpers.

use super::{HostTree, NodeId};
use crate::types::Value;

const GENERATION_SHIFT: u32 = 32;

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        namespace: Option<String>,
        attributes: Vec<(String, String)>,
        properties: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
    Fragment,
}

#[derive(Debug, Clone)]
struct NodeRecord {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    generation: u32,
}

/// Slab-backed in-memory output tree.
#[derive(Debug, Default)]
pub struct MemoryTree {
    nodes: Vec<Option<NodeRecord>>,
    free: Vec<u32>,
    generations: Vec<u32>,
    /// Ordered log of mutating operations, for tests.
    pub ops: Vec<String>,
}

impl MemoryTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, kind: NodeKind) -> NodeId {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.nodes.push(None);
                self.generations.push(0);
                (self.nodes.len() - 1) as u32
            }
        };
        let generation = self.generations[slot as usize];
        self.nodes[slot as usize] = Some(NodeRecord {
            kind,
            parent: None,
            children: Vec::new(),
            generation,
        });
        NodeId(((generation as u64) << GENERATION_SHIFT) | slot as u64)
    }

    fn slot_of(&self, node: NodeId) -> usize {
        let slot = (node.0 & u32::MAX as u64) as usize;
        let generation = (node.0 >> GENERATION_SHIFT) as u32;
        let record = self.nodes.get(slot).and_then(Option::as_ref);
        match record {
            Some(record) if record.generation == generation => slot,
            _ => panic!("memory tree: stale or unknown node handle {node}"),
        }
    }

    fn record(&self, node: NodeId) -> &NodeRecord {
        let slot = self.slot_of(node);
        self.nodes[slot].as_ref().unwrap()
    }

    fn record_mut(&mut self, node: NodeId) -> &mut NodeRecord {
        let slot = self.slot_of(node);
        self.nodes[slot].as_mut().unwrap()
    }

    /// Release a node and its whole subtree back to the free pool.
    ///
    /// Detaches the node first if attached. Handles into the released
    /// subtree become stale.
    pub fn release(&mut self, node: NodeId) {
        if let Some(parent) = self.record(node).parent {
            self.detach(parent, node);
        }
        let children = self.record(node).children.clone();
        for child in children {
            // Children are detached implicitly when their record is freed.
            self.record_mut(child).parent = None;
            self.release(child);
        }
        let slot = self.slot_of(node);
        self.nodes[slot] = None;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free.push(slot as u32);
    }

    /// Number of live nodes.
    pub fn live_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Children of a node.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.record(node).children.clone()
    }

    fn detach(&mut self, parent: NodeId, child: NodeId) {
        let record = self.record_mut(parent);
        record.children.retain(|c| *c != child);
        self.record_mut(child).parent = None;
    }

    fn detach_from_current_parent(&mut self, child: NodeId) {
        if let Some(parent) = self.record(child).parent {
            self.detach(parent, child);
        }
    }

    /// Nodes that actually get attached when `child` is inserted: the
    /// child itself, or a fragment's children, drained.
    fn attachable(&mut self, child: NodeId) -> Vec<NodeId> {
        if matches!(self.record(child).kind, NodeKind::Fragment) {
            let children = std::mem::take(&mut self.record_mut(child).children);
            for moved in &children {
                self.record_mut(*moved).parent = None;
            }
            children
        } else {
            self.detach_from_current_parent(child);
            vec![child]
        }
    }

    fn insert_at(&mut self, parent: NodeId, child: NodeId, position: Option<usize>) {
        let moved = self.attachable(child);
        for (offset, node) in moved.iter().enumerate() {
            self.record_mut(*node).parent = Some(parent);
            let children = &mut self.record_mut(parent).children;
            match position {
                Some(index) => children.insert(index + offset, *node),
                None => children.push(*node),
            }
        }
    }

    /// Concatenated text content of a subtree.
    pub fn text_content(&self, node: NodeId) -> String {
        match &self.record(node).kind {
            NodeKind::Text(text) => text.clone(),
            NodeKind::Comment(_) => String::new(),
            _ => self
                .record(node)
                .children
                .clone()
                .into_iter()
                .map(|child| self.text_content(child))
                .collect(),
        }
    }

    /// Read a direct property, if assigned.
    pub fn property(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.record(node).kind {
            NodeKind::Element { properties, .. } => properties
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    /// HTML-ish snapshot of a subtree, for test assertions.
    pub fn outer_html(&self, node: NodeId) -> String {
        match &self.record(node).kind {
            NodeKind::Text(text) => text.clone(),
            NodeKind::Comment(text) => format!("<!--{text}-->"),
            NodeKind::Fragment => self
                .record(node)
                .children
                .iter()
                .map(|child| self.outer_html(*child))
                .collect(),
            NodeKind::Element {
                tag, attributes, ..
            } => {
                let mut out = format!("<{tag}");
                for (name, value) in attributes {
                    out.push_str(&format!(" {name}=\"{value}\""));
                }
                out.push('>');
                for child in &self.record(node).children {
                    out.push_str(&self.outer_html(*child));
                }
                out.push_str(&format!("</{tag}>"));
                out
            }
        }
    }
}

impl HostTree for MemoryTree {
    fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> NodeId {
        self.allocate(NodeKind::Element {
            tag: tag.to_string(),
            namespace: namespace.map(str::to_string),
            attributes: Vec::new(),
            properties: Vec::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.allocate(NodeKind::Text(text.to_string()))
    }

    fn create_comment(&mut self, text: &str) -> NodeId {
        self.allocate(NodeKind::Comment(text.to_string()))
    }

    fn create_fragment(&mut self) -> NodeId {
        self.allocate(NodeKind::Fragment)
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.ops.push(format!("append {child} -> {parent}"));
        self.insert_at(parent, child, None);
    }

    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        self.ops
            .push(format!("insert {child} -> {parent} before {reference}"));
        // Detaching the child first can shift the reference position, so
        // resolve the position after each detach.
        let moved = self.attachable(child);
        for node in moved {
            let position = self
                .record(parent)
                .children
                .iter()
                .position(|c| *c == reference)
                .unwrap_or_else(|| {
                    panic!("memory tree: reference {reference} is not a child of {parent}")
                });
            self.record_mut(node).parent = Some(parent);
            self.record_mut(parent).children.insert(position, node);
        }
    }

    fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) {
        self.ops
            .push(format!("replace {old_child} with {new_child} in {parent}"));
        let position = self
            .record(parent)
            .children
            .iter()
            .position(|c| *c == old_child)
            .unwrap_or_else(|| {
                panic!("memory tree: {old_child} is not a child of {parent}")
            });
        self.detach(parent, old_child);
        self.insert_at(parent, new_child, Some(position));
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        self.ops.push(format!("remove {child} from {parent}"));
        self.detach(parent, child);
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.record(node).parent
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.record(node).children.first().copied()
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.record(node).parent?;
        let children = &self.record(parent).children;
        let position = children.iter().position(|c| *c == node)?;
        children.get(position + 1).copied()
    }

    fn tag(&self, node: NodeId) -> Option<String> {
        match &self.record(node).kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    fn is_text(&self, node: NodeId) -> bool {
        matches!(self.record(node).kind, NodeKind::Text(_))
    }

    fn text(&self, node: NodeId) -> Option<String> {
        match &self.record(node).kind {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text.clone()),
            _ => None,
        }
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        self.ops.push(format!("text {node} = {text:?}"));
        match &mut self.record_mut(node).kind {
            NodeKind::Text(current) => *current = text.to_string(),
            other => panic!("memory tree: set_text on non-text node {other:?}"),
        }
    }

    fn attribute_names(&self, node: NodeId) -> Vec<String> {
        match &self.record(node).kind {
            NodeKind::Element { attributes, .. } => {
                attributes.iter().map(|(name, _)| name.clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.record(node).kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        self.ops.push(format!("attr {node} {name}={value:?}"));
        match &mut self.record_mut(node).kind {
            NodeKind::Element { attributes, .. } => {
                if let Some(entry) = attributes.iter_mut().find(|(n, _)| n == name) {
                    entry.1 = value.to_string();
                } else {
                    attributes.push((name.to_string(), value.to_string()));
                }
            }
            other => panic!("memory tree: set_attribute on non-element {other:?}"),
        }
    }

    fn set_attribute_ns(&mut self, node: NodeId, namespace: Option<&str>, name: &str, value: &str) {
        self.ops.push(format!(
            "attr-ns {node} {}:{name}={value:?}",
            namespace.unwrap_or("-")
        ));
        // The in-memory store keeps namespaced attributes in the same
        // ordered list, under their qualified name.
        match &mut self.record_mut(node).kind {
            NodeKind::Element { attributes, .. } => {
                if let Some(entry) = attributes.iter_mut().find(|(n, _)| n == name) {
                    entry.1 = value.to_string();
                } else {
                    attributes.push((name.to_string(), value.to_string()));
                }
            }
            other => panic!("memory tree: set_attribute_ns on non-element {other:?}"),
        }
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        self.ops.push(format!("unattr {node} {name}"));
        if let NodeKind::Element { attributes, .. } = &mut self.record_mut(node).kind {
            attributes.retain(|(n, _)| n != name);
        }
    }

    fn set_property(&mut self, node: NodeId, name: &str, value: &Value) {
        let rendered = value.as_text().unwrap_or_else(|| format!("<{}>", value.kind()));
        self.ops.push(format!("prop {node} {name}={rendered:?}"));
        match &mut self.record_mut(node).kind {
            NodeKind::Element { properties, .. } => {
                if let Some(entry) = properties.iter_mut().find(|(n, _)| n == name) {
                    entry.1 = rendered;
                } else {
                    properties.push((name.to_string(), rendered));
                }
            }
            other => panic!("memory tree: set_property on non-element {other:?}"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_and_snapshot() {
        let mut tree = MemoryTree::new();
        let div = tree.create_element("div", None);
        let span = tree.create_element("span", None);
        let text = tree.create_text("hello");

        tree.append_child(span, text);
        tree.append_child(div, span);
        tree.set_attribute(div, "class", "hero");

        assert_eq!(tree.outer_html(div), "<div class=\"hero\"><span>hello</span></div>");
        assert_eq!(tree.text_content(div), "hello");
    }

    #[test]
    fn test_insert_before_and_replace() {
        let mut tree = MemoryTree::new();
        let list = tree.create_element("ul", None);
        let a = tree.create_element("li", None);
        let b = tree.create_element("li", None);
        let c = tree.create_element("li", None);

        tree.append_child(list, a);
        tree.append_child(list, c);
        tree.insert_before(list, b, c);
        assert_eq!(tree.children(list), vec![a, b, c]);

        let d = tree.create_element("li", None);
        tree.replace_child(list, d, b);
        assert_eq!(tree.children(list), vec![a, d, c]);
        assert_eq!(tree.parent(b), None, "replaced child should be detached");
    }

    #[test]
    fn test_insert_moves_existing_child() {
        let mut tree = MemoryTree::new();
        let list = tree.create_element("ul", None);
        let a = tree.create_element("li", None);
        let b = tree.create_element("li", None);
        let c = tree.create_element("li", None);
        tree.append_child(list, a);
        tree.append_child(list, b);
        tree.append_child(list, c);

        // Moving c before a detaches it first.
        tree.insert_before(list, c, a);
        assert_eq!(tree.children(list), vec![c, a, b]);

        tree.append_child(list, a);
        assert_eq!(tree.children(list), vec![c, b, a]);
    }

    #[test]
    fn test_fragment_moves_children() {
        let mut tree = MemoryTree::new();
        let fragment = tree.create_fragment();
        let a = tree.create_text("a");
        let b = tree.create_text("b");
        tree.append_child(fragment, a);
        tree.append_child(fragment, b);

        let div = tree.create_element("div", None);
        tree.append_child(div, fragment);

        assert_eq!(tree.children(div), vec![a, b]);
        assert_eq!(tree.children(fragment), Vec::<NodeId>::new());
        assert_eq!(tree.parent(a), Some(div));
    }

    #[test]
    fn test_sibling_navigation() {
        let mut tree = MemoryTree::new();
        let div = tree.create_element("div", None);
        let a = tree.create_text("a");
        let b = tree.create_text("b");
        tree.append_child(div, a);
        tree.append_child(div, b);

        assert_eq!(tree.first_child(div), Some(a));
        assert_eq!(tree.next_sibling(a), Some(b));
        assert_eq!(tree.next_sibling(b), None);
    }

    #[test]
    fn test_release_recycles_with_fresh_generation() {
        let mut tree = MemoryTree::new();
        let div = tree.create_element("div", None);
        let text = tree.create_text("x");
        tree.append_child(div, text);

        assert_eq!(tree.live_count(), 2);
        tree.release(div);
        assert_eq!(tree.live_count(), 0);

        let fresh = tree.create_element("p", None);
        assert_ne!(fresh, div, "recycled slot must not alias the old handle");
        assert_ne!(fresh, text);
    }

    #[test]
    #[should_panic(expected = "stale or unknown node handle")]
    fn test_stale_handle_panics() {
        let mut tree = MemoryTree::new();
        let div = tree.create_element("div", None);
        tree.release(div);
        let _ = tree.tag(div);
    }

    #[test]
    fn test_attributes_and_properties() {
        let mut tree = MemoryTree::new();
        let input = tree.create_element("input", None);

        tree.set_attribute(input, "type", "checkbox");
        tree.set_attribute(input, "type", "text");
        assert_eq!(tree.attribute(input, "type"), Some("text".to_string()));
        assert_eq!(tree.attribute_names(input), vec!["type".to_string()]);

        tree.remove_attribute(input, "type");
        assert_eq!(tree.attribute(input, "type"), None);

        tree.set_property(input, "indeterminate", &Value::Bool(true));
        assert_eq!(tree.property(input, "indeterminate"), Some("true".to_string()));
    }
}
