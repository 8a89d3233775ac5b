//! Scalar child reconciliation - the per-slot update state machine.
//!
//! Decision table over (current occupant, new value):
//!
//! | new value          | action                                          |
//! |--------------------|-------------------------------------------------|
//! | null               | remove occupant, slot becomes empty             |
//! | compatible partial | patch in place (never a placeholder)            |
//! | other partial      | render with the occupant as reuse hint, replace |
//! | array              | hand off to the list reconciler                 |
//! | async              | defer; the occupant stays until resolution      |
//! | scalar             | stringify; mutate text in place when both sides |
//! |                    | are text nodes, replace otherwise               |
//!
//! Switching between incompatible kinds always replaces nodes rather than
//! mutating across kinds.

use tracing::{error, trace};

use crate::host::{HostTree, NodeId};
use crate::resolve::{unwind, Resolved};
use crate::types::{Partial, Value};

use super::build::collect_children;
use super::{apply_editors, list, render_partial, untrack_subtree, ChildSlot, CtxRef, Inner, ListEntry, Occupant};

/// Entry point for a child slot editor: unwind, then apply or defer.
pub(crate) fn update_slot<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    ctx: &CtxRef,
    slot: &ChildSlot,
    value: &Value,
) {
    match unwind(value.clone()) {
        Resolved::Now(value) => apply_value(inner, ctx, slot, &value),
        Resolved::Later(future) => defer(inner, ctx, slot, future),
    }
}

/// Apply an already-terminal value to a child slot.
pub(crate) fn apply_value<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    ctx: &CtxRef,
    slot: &ChildSlot,
    value: &Value,
) {
    match value {
        Value::Null => clear(inner, slot),
        Value::List(_) => list::reconcile(inner, ctx, slot, value),
        Value::Partial(partial) => apply_partial(inner, slot, partial),
        scalar if scalar.is_scalar() => apply_text(inner, slot, &scalar.as_text().unwrap()),
        other => panic!("quilt: {} value cannot occupy a child slot", other.kind()),
    }
}

/// Remove whatever occupies the slot.
fn clear<H: HostTree + 'static>(inner: &mut Inner<H>, slot: &ChildSlot) {
    for node in slot.occupant().nodes() {
        if let Some(parent) = inner.host.parent(node) {
            inner.host.remove_child(parent, node);
        }
        untrack_subtree(inner, node);
    }
    slot.set_occupant(Occupant::Empty);
}

fn apply_partial<H: HostTree + 'static>(inner: &mut Inner<H>, slot: &ChildSlot, partial: &Partial) {
    let occupant = slot.occupant();

    // Patch path: the occupant is real rendered output under the same key.
    if let Occupant::Node(node) = &occupant {
        if let Some(existing) = inner.contexts.get(node).cloned() {
            if &existing.key == partial.key() && !existing.is_placeholder {
                trace!(key = %existing.key, "patching child slot in place");
                apply_editors(inner, &existing, partial.values());
                return;
            }
        }
    }

    // Replace path, with the current occupant offered for reuse.
    let reuse = match &occupant {
        Occupant::Node(node) | Occupant::Placeholder(node) => Some(*node),
        _ => None,
    };
    let fresh = render_partial(inner, partial, reuse);
    mount(inner, slot, &fresh, occupant);
}

/// Splice a freshly rendered context into the slot in place of the
/// current occupant.
fn mount<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    slot: &ChildSlot,
    fresh: &CtxRef,
    occupant: Occupant,
) {
    let parent = slot.parent.get();
    let root = fresh.node();

    if fresh.is_fragment {
        // Expand the fragment: its children become the slot's occupants
        // and the (detached, now empty) fragment node drops out of the
        // side table.
        let kids = collect_children(inner, root);
        match occupant.first_node() {
            Some(first) => {
                inner.host.insert_before(parent, root, first);
                remove_occupant_nodes(inner, &occupant);
            }
            None => insert_into_slot(inner, slot, root),
        }
        fresh.root.set(parent);
        inner.contexts.remove(&root);
        slot.set_occupant(Occupant::Many(kids.into_iter().map(ListEntry::One).collect()));
        return;
    }

    match &occupant {
        Occupant::Empty => insert_into_slot(inner, slot, root),
        Occupant::Placeholder(old) | Occupant::Node(old) => {
            if !inner.host.same_node(*old, root) {
                replace_single(inner, slot, root, *old);
            }
        }
        Occupant::Many(_) => {
            match occupant.first_node() {
                Some(first) => inner.host.insert_before(parent, root, first),
                None => insert_into_slot(inner, slot, root),
            }
            remove_occupant_nodes(inner, &occupant);
        }
    }
    slot.set_occupant(Occupant::Node(root));
}

fn apply_text<H: HostTree + 'static>(inner: &mut Inner<H>, slot: &ChildSlot, text: &str) {
    let occupant = slot.occupant();

    // Text over text mutates in place, no node churn.
    if let Occupant::Node(node) = &occupant {
        if inner.host.is_text(*node) {
            inner.host.set_text(*node, text);
            return;
        }
    }

    let fresh = inner.host.create_text(text);
    match &occupant {
        Occupant::Empty => insert_into_slot(inner, slot, fresh),
        Occupant::Placeholder(old) | Occupant::Node(old) => replace_single(inner, slot, fresh, *old),
        Occupant::Many(_) => {
            match occupant.first_node() {
                Some(first) => inner.host.insert_before(slot.parent.get(), fresh, first),
                None => insert_into_slot(inner, slot, fresh),
            }
            remove_occupant_nodes(inner, &occupant);
        }
    }
    slot.set_occupant(Occupant::Node(fresh));
}

/// Replace a single-node occupant, falling back to positional insertion
/// when it is no longer attached.
fn replace_single<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    slot: &ChildSlot,
    fresh: NodeId,
    old: NodeId,
) {
    match inner.host.parent(old) {
        Some(parent) => inner.host.replace_child(parent, fresh, old),
        None => insert_into_slot(inner, slot, fresh),
    }
    untrack_subtree(inner, old);
}

fn remove_occupant_nodes<H: HostTree + 'static>(inner: &mut Inner<H>, occupant: &Occupant) {
    for node in occupant.nodes() {
        if let Some(parent) = inner.host.parent(node) {
            inner.host.remove_child(parent, node);
        }
        untrack_subtree(inner, node);
    }
}

/// Insert a node into an empty slot, relative to the nearest
/// already-placed sibling.
pub(crate) fn insert_into_slot<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    slot: &ChildSlot,
    node: NodeId,
) {
    let parent = slot.parent.get();
    match slot.anchor_after() {
        Some(anchor) => inner.host.insert_before(parent, node, anchor),
        None => inner.host.append_child(parent, node),
    }
}

/// Defer an async child value. The current occupant stays put; the
/// continuation applies through the normal path if its token survives.
fn defer<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    ctx: &CtxRef,
    slot: &ChildSlot,
    future: futures::future::LocalBoxFuture<'static, Result<Value, crate::error::AsyncError>>,
) {
    let token = inner.next_token();
    ctx.pending.borrow_mut().insert(token);
    let pending = ctx.pending.clone();
    let weak = inner.weak.clone();
    let ctx = ctx.clone();
    let slot = slot.clone();
    inner.spawn(async move {
        let result = future.await;
        let Some(cell) = weak.upgrade() else { return };
        if !pending.borrow_mut().remove(&token) {
            trace!("stale async child value discarded");
            return;
        }
        let mut inner = cell.borrow_mut();
        match result {
            Ok(value) => apply_value(&mut inner, &ctx, &slot, &value),
            Err(err) => error!("unhandled async rejection in child slot: {err}"),
        }
    });
}
