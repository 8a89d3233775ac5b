//! Keyed list reconciliation for array-valued child slots.
//!
//! New values flatten recursively; the previous occupants flatten one
//! level. For each new value in order: a partial searches the remaining
//! unmatched old nodes for the first one rendered under the same key
//! (stable first-match tie-break) and patches it in place; everything
//! else renders a brand-new node. A placement pass then walks the results
//! left to right, moving or inserting each node after its predecessor -
//! matched nodes are repositioned, never recreated. Old nodes that no new
//! value claimed are removed at the end.
//!
//! Async items keep an empty entry at their position and splice in on
//! resolution, relative to whatever neighbors are placed by then.

use tracing::{error, trace, warn};

use crate::host::{HostTree, NodeId};
use crate::resolve::{unwind, Resolved};
use crate::types::{Partial, Value};

use super::build::collect_children;
use super::{apply_editors, render_partial, untrack_subtree, ChildSlot, CtxRef, Inner, ListEntry, Occupant};

/// Reconcile a list value against a slot's current occupants.
pub(crate) fn reconcile<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    ctx: &CtxRef,
    slot: &ChildSlot,
    value: &Value,
) {
    let mut values = Vec::new();
    flatten(value, &mut values);

    let occupant = slot.occupant();
    let mut remaining: Vec<NodeId> = occupant.nodes();

    // Match/render pass.
    let mut placed: Vec<ListEntry> = Vec::with_capacity(values.len());
    for (index, item) in values.into_iter().enumerate() {
        match unwind(item) {
            Resolved::Later(future) => {
                placed.push(ListEntry::Empty);
                defer_item(inner, ctx, slot, index, future);
            }
            Resolved::Now(item) => {
                let entry = render_item(inner, slot.parent.get(), &item, &mut remaining);
                placed.push(entry);
            }
        }
    }

    // Placement pass: every node lands immediately after its predecessor.
    let parent = slot.parent.get();
    let mut cursor: Option<NodeId> = None;
    for entry in &placed {
        for node in entry.nodes() {
            let anchor = match cursor {
                Some(previous) => inner.host.next_sibling(previous),
                None => region_start(inner, slot),
            };
            match anchor {
                Some(anchor) if inner.host.same_node(anchor, node) => {}
                Some(anchor) => inner.host.insert_before(parent, node, anchor),
                None => inner.host.append_child(parent, node),
            }
            cursor = Some(node);
        }
    }

    // Unmatched old nodes are gone.
    for node in remaining {
        if let Some(parent) = inner.host.parent(node) {
            inner.host.remove_child(parent, node);
        }
        untrack_subtree(inner, node);
    }

    slot.set_occupant(Occupant::Many(placed));
}

/// Recursively flatten nested lists into one sequence.
fn flatten(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::List(items) => {
            for item in items {
                flatten(item, out);
            }
        }
        other => out.push(other.clone()),
    }
}

/// Produce the entry for one terminal list item, consuming a matched old
/// node where possible.
fn render_item<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    parent: NodeId,
    value: &Value,
    remaining: &mut Vec<NodeId>,
) -> ListEntry {
    match value {
        Value::Null => ListEntry::Empty,
        Value::Partial(partial) => match match_key(inner, partial, remaining) {
            Some(node) => {
                let existing = inner.contexts.get(&node).cloned().unwrap();
                apply_editors(inner, &existing, partial.values());
                ListEntry::One(node)
            }
            None => fresh_entry(inner, parent, partial),
        },
        Value::List(_) => {
            // A resumable computation can resolve straight to a nested
            // array; expand it into a group at this position.
            let mut values = Vec::new();
            flatten(value, &mut values);
            let mut nodes = Vec::new();
            for item in values {
                match unwind(item) {
                    Resolved::Now(item) => {
                        nodes.extend(render_item(inner, parent, &item, remaining).nodes());
                    }
                    Resolved::Later(_) => {
                        warn!("async value inside an already-resolved list group is dropped");
                    }
                }
            }
            ListEntry::Group(nodes)
        }
        scalar if scalar.is_scalar() => {
            ListEntry::One(inner.host.create_text(&scalar.as_text().unwrap()))
        }
        other => panic!("quilt: {} value cannot occupy a list position", other.kind()),
    }
}

/// First remaining old node rendered under the partial's key, in original
/// relative order.
fn match_key<H: HostTree + 'static>(
    inner: &Inner<H>,
    partial: &Partial,
    remaining: &mut Vec<NodeId>,
) -> Option<NodeId> {
    let position = remaining.iter().position(|node| {
        inner
            .contexts
            .get(node)
            .is_some_and(|existing| &existing.key == partial.key() && !existing.is_placeholder)
    })?;
    Some(remaining.remove(position))
}

/// Render a brand-new node for an unmatched partial.
fn fresh_entry<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    parent: NodeId,
    partial: &Partial,
) -> ListEntry {
    let fresh = render_partial(inner, partial, None);
    let root = fresh.node();
    if fresh.is_fragment {
        // The placement pass moves the fragment's children one by one;
        // rebind the context to the slot's parent and let the empty
        // fragment node go.
        let kids = collect_children(inner, root);
        fresh.root.set(parent);
        inner.contexts.remove(&root);
        ListEntry::Group(kids)
    } else {
        ListEntry::One(root)
    }
}

/// First node in the slot's region: the node after the previous sibling,
/// or the parent's first child when the slot region starts the parent.
fn region_start<H: HostTree + 'static>(inner: &Inner<H>, slot: &ChildSlot) -> Option<NodeId> {
    match slot.last_before() {
        Some(previous) => inner.host.next_sibling(previous),
        None => inner.host.first_child(slot.parent.get()),
    }
}

/// Defer one async list item, keeping its position reserved.
fn defer_item<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    ctx: &CtxRef,
    slot: &ChildSlot,
    index: usize,
    future: futures::future::LocalBoxFuture<'static, Result<Value, crate::error::AsyncError>>,
) {
    let token = inner.next_token();
    ctx.pending.borrow_mut().insert(token);
    let pending = ctx.pending.clone();
    let weak = inner.weak.clone();
    let slot = slot.clone();
    inner.spawn(async move {
        let result = future.await;
        let Some(cell) = weak.upgrade() else { return };
        if !pending.borrow_mut().remove(&token) {
            trace!("stale async list item discarded");
            return;
        }
        let mut inner = cell.borrow_mut();
        match result {
            Ok(value) => apply_resolved_item(&mut inner, &slot, index, &value),
            Err(err) => error!(position = index, "unhandled async rejection in list item: {err}"),
        }
    });
}

/// Splice a resolved async item into its reserved position, preserving
/// the order of its already-placed neighbors.
fn apply_resolved_item<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    slot: &ChildSlot,
    index: usize,
    value: &Value,
) {
    let Occupant::Many(mut entries) = slot.occupant() else {
        warn!("list slot changed shape before async item resolved; discarding");
        return;
    };
    if index >= entries.len() {
        warn!("list shrank before async item resolved; discarding");
        return;
    }

    let mut remaining = Vec::new();
    let entry = render_item(inner, slot.parent.get(), value, &mut remaining);

    let parent = slot.parent.get();
    let anchor = entries[index + 1..]
        .iter()
        .find_map(ListEntry::first_node)
        .or_else(|| slot.anchor_after());
    for node in entry.nodes() {
        match anchor {
            Some(anchor) => inner.host.insert_before(parent, node, anchor),
            None => inner.host.append_child(parent, node),
        }
    }

    entries[index] = entry;
    slot.set_occupant(Occupant::Many(entries));
}
