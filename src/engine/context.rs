//! Rendered contexts and editors.
//!
//! A [`RenderedContext`] is the live binding produced by rendering a
//! partial: the root node (behind a rebindable cell, since fragment roots
//! hand their children to a mount target), the editors sorted by slot
//! index, the pending-token set guarding async continuations, and the
//! placeholder flag.
//!
//! Editors are plain data, not closures: each one names its slot index and
//! an [`EditOp`] describing what to mutate. Applying them is the engine's
//! job, always in ascending index order.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use crate::host::NodeId;
use crate::reference::Ref;
use crate::template::MixedPart;
use crate::types::PartialKey;

/// Token identifying one in-flight async continuation.
pub type PendingToken = u64;

/// Shared handle to a rendered context.
pub(crate) type CtxRef = Rc<RenderedContext>;

// =============================================================================
// Child slots
// =============================================================================

/// What currently occupies a dynamic child slot.
#[derive(Debug, Clone)]
pub(crate) enum Occupant {
    /// Nothing (a null value removed the previous occupant).
    Empty,
    /// The compile-time marker comment; no value has produced output yet.
    Placeholder(NodeId),
    /// A single rendered node.
    Node(NodeId),
    /// List state: one entry per reconciled value position.
    Many(Vec<ListEntry>),
}

/// One position of a list-valued slot.
#[derive(Debug, Clone)]
pub(crate) enum ListEntry {
    /// Nothing rendered (null value, or an async item still pending).
    Empty,
    /// A single node.
    One(NodeId),
    /// A fragment or nested array expanded into several nodes.
    Group(Vec<NodeId>),
}

impl ListEntry {
    pub(crate) fn nodes(&self) -> Vec<NodeId> {
        match self {
            ListEntry::Empty => Vec::new(),
            ListEntry::One(node) => vec![*node],
            ListEntry::Group(nodes) => nodes.clone(),
        }
    }

    pub(crate) fn first_node(&self) -> Option<NodeId> {
        match self {
            ListEntry::Empty => None,
            ListEntry::One(node) => Some(*node),
            ListEntry::Group(nodes) => nodes.first().copied(),
        }
    }
}

impl Occupant {
    /// All nodes currently in the output tree for this slot, in order.
    /// List entries flatten one level.
    pub(crate) fn nodes(&self) -> Vec<NodeId> {
        match self {
            Occupant::Empty => Vec::new(),
            Occupant::Placeholder(node) | Occupant::Node(node) => vec![*node],
            Occupant::Many(entries) => entries.iter().flat_map(ListEntry::nodes).collect(),
        }
    }

    pub(crate) fn first_node(&self) -> Option<NodeId> {
        self.nodes().first().copied()
    }

    pub(crate) fn last_node(&self) -> Option<NodeId> {
        self.nodes().last().copied()
    }
}

/// One ordered position among an element's children: either a fixed node
/// (static text, comment, nested element) or a dynamic slot with its
/// current occupant.
#[derive(Debug, Clone)]
pub(crate) enum SiblingEntry {
    Fixed(NodeId),
    Slot(Occupant),
}

impl SiblingEntry {
    pub(crate) fn first_node(&self) -> Option<NodeId> {
        match self {
            SiblingEntry::Fixed(node) => Some(*node),
            SiblingEntry::Slot(occupant) => occupant.first_node(),
        }
    }

    pub(crate) fn last_node(&self) -> Option<NodeId> {
        match self {
            SiblingEntry::Fixed(node) => Some(*node),
            SiblingEntry::Slot(occupant) => occupant.last_node(),
        }
    }
}

/// A dynamic child slot's address: the owning parent (behind the element's
/// rebindable cell), its position among the element's children, and the
/// shared sibling list its occupant state lives in.
#[derive(Clone)]
pub(crate) struct ChildSlot {
    pub(crate) parent: Rc<Cell<NodeId>>,
    pub(crate) position: usize,
    pub(crate) siblings: Rc<RefCell<Vec<SiblingEntry>>>,
}

impl ChildSlot {
    pub(crate) fn occupant(&self) -> Occupant {
        match &self.siblings.borrow()[self.position] {
            SiblingEntry::Slot(occupant) => occupant.clone(),
            SiblingEntry::Fixed(_) => unreachable!("child slot registered at a fixed position"),
        }
    }

    pub(crate) fn set_occupant(&self, occupant: Occupant) {
        self.siblings.borrow_mut()[self.position] = SiblingEntry::Slot(occupant);
    }

    /// The node the next inserted occupant should land before: the first
    /// present node after this slot among its siblings.
    pub(crate) fn anchor_after(&self) -> Option<NodeId> {
        let siblings = self.siblings.borrow();
        siblings[self.position + 1..]
            .iter()
            .find_map(SiblingEntry::first_node)
    }

    /// The node just before this slot's region, if any.
    pub(crate) fn last_before(&self) -> Option<NodeId> {
        let siblings = self.siblings.borrow();
        siblings[..self.position]
            .iter()
            .rev()
            .find_map(SiblingEntry::last_node)
    }
}

// =============================================================================
// Editors
// =============================================================================

/// The mutation bound to one slot.
pub(crate) enum EditOp {
    /// Re-apply an attribute whose value is the slot.
    AttrValue {
        node: NodeId,
        name: Rc<str>,
        namespace: Option<Rc<str>>,
        /// The ref bound on the previous pass, for uid transfer.
        last_ref: RefCell<Option<Ref>>,
    },
    /// Apply the paired static value under the name (or map) the slot
    /// provides.
    AttrName {
        node: NodeId,
        value: Rc<str>,
        namespace: Option<Rc<str>>,
    },
    /// Re-concatenate a mixed attribute value from all current values.
    AttrMixed {
        node: NodeId,
        name: Rc<str>,
        parts: Rc<[MixedPart]>,
        namespace: Option<Rc<str>>,
    },
    /// Reconcile a child slot.
    Child { slot: ChildSlot },
}

/// A slot index paired with its mutation.
pub(crate) struct Editor {
    pub(crate) index: usize,
    pub(crate) op: EditOp,
}

// =============================================================================
// RenderedContext
// =============================================================================

/// The live binding between an output node, its editors and its state.
pub struct RenderedContext {
    pub(crate) key: PartialKey,
    pub(crate) root: Rc<Cell<NodeId>>,
    pub(crate) editors: Vec<Editor>,
    pub(crate) slot_count: usize,
    pub(crate) pending: Rc<RefCell<HashSet<PendingToken>>>,
    pub(crate) is_placeholder: bool,
    pub(crate) is_fragment: bool,
}

impl RenderedContext {
    pub(crate) fn new(
        key: PartialKey,
        root: Rc<Cell<NodeId>>,
        mut editors: Vec<Editor>,
        slot_count: usize,
        is_placeholder: bool,
        is_fragment: bool,
    ) -> CtxRef {
        // The one ordering guarantee everything else leans on: editors
        // apply in ascending slot order, regardless of construction order.
        editors.sort_by_key(|editor| editor.index);
        Rc::new(Self {
            key,
            root,
            editors,
            slot_count,
            pending: Rc::new(RefCell::new(HashSet::new())),
            is_placeholder,
            is_fragment,
        })
    }

    /// The context's current root node.
    pub fn node(&self) -> NodeId {
        self.root.get()
    }

    /// The key this context was rendered under.
    pub fn key(&self) -> &PartialKey {
        &self.key
    }

    /// Whether this is a compile-time placeholder, not rendered output.
    pub fn is_placeholder(&self) -> bool {
        self.is_placeholder
    }
}
