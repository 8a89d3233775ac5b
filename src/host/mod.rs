//! Host tree adapter.
//!
//! The engine never owns or mutates an output tree directly. Everything
//! goes through the [`HostTree`] trait: node creation returns an opaque
//! [`NodeId`] handle, and all structural mutation, attribute access and
//! inspection happens against those handles. A DOM, a retained terminal
//! scene, or the bundled [`MemoryTree`] test adapter all fit behind the
//! same seam.
//!
//! Fragments follow move semantics: appending or inserting a fragment
//! moves its children into the new parent and leaves the fragment empty.

mod memory;

pub use memory::MemoryTree;

use crate::types::Value;

/// Opaque handle to an output node, assigned by the adapter.
///
/// Handle equality is node identity; the engine keys its side tables by
/// it. Adapters that recycle storage must make sure a freed handle is
/// never observable as equal to a live one (the bundled adapter packs a
/// generation counter into the handle for exactly this reason).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// The narrow interface the engine consumes for all output-tree work.
///
/// Implementations surface their own platform errors immediately (the
/// bundled adapter panics on stale handles); the engine never retries an
/// adapter call.
pub trait HostTree {
    /// Create an element, optionally in a namespace.
    fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> NodeId;

    /// Create a text node.
    fn create_text(&mut self, text: &str) -> NodeId;

    /// Create a comment node.
    fn create_comment(&mut self, text: &str) -> NodeId;

    /// Create an empty fragment.
    fn create_fragment(&mut self) -> NodeId;

    /// Append `child` as the last child of `parent`, detaching it from any
    /// previous parent. Appending a fragment moves its children.
    fn append_child(&mut self, parent: NodeId, child: NodeId);

    /// Insert `child` immediately before `reference` (a child of
    /// `parent`), detaching it from any previous parent first.
    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId);

    /// Replace `old_child` with `new_child`. The old child is detached but
    /// stays alive.
    fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId);

    /// Detach `child` from `parent`.
    fn remove_child(&mut self, parent: NodeId, child: NodeId);

    /// The parent of a node, if attached.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// The first child of a node.
    fn first_child(&self, node: NodeId) -> Option<NodeId>;

    /// The next sibling of a node.
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;

    /// The tag of an element node.
    fn tag(&self, node: NodeId) -> Option<String>;

    /// Whether the node is a text node.
    fn is_text(&self, node: NodeId) -> bool;

    /// The content of a text or comment node.
    fn text(&self, node: NodeId) -> Option<String>;

    /// Overwrite the content of a text node.
    fn set_text(&mut self, node: NodeId, text: &str);

    /// Names of all attributes currently present on an element.
    fn attribute_names(&self, node: NodeId) -> Vec<String>;

    /// Read an attribute.
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Set an attribute.
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);

    /// Set a namespaced attribute. `namespace` of `None` means the
    /// element's own namespace scope.
    fn set_attribute_ns(&mut self, node: NodeId, namespace: Option<&str>, name: &str, value: &str);

    /// Remove an attribute if present.
    fn remove_attribute(&mut self, node: NodeId, name: &str);

    /// Assign a direct property (handler-like and direct-table names
    /// bypass the attribute store).
    fn set_property(&mut self, node: NodeId, name: &str, value: &Value);

    /// Node identity test.
    fn same_node(&self, a: NodeId, b: NodeId) -> bool {
        a == b
    }
}
