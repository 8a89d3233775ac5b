//! Template invocation - output node construction and editor wiring.
//!
//! Building instantiates a compiled template against a value list: create
//! (or reuse) the element for each descriptor, apply static attributes
//! immediately, register an editor for every slotted position, append
//! static children, drop a placeholder marker into each dynamic child
//! slot, and recurse into nested descriptors, splicing their editors into
//! the same list.
//!
//! Reuse mode kicks in when the caller supplies an existing node whose
//! tag matches the descriptor: the node is adopted, attributes the
//! descriptor does not know are stripped, and its children are offered to
//! the descriptor's children for adoption (text nodes mutate in place,
//! same-tag elements recurse, partial slots claim subtrees carrying a
//! compatible key). Whatever is left over is removed.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use crate::host::{HostTree, NodeId};
use crate::template::{CompiledAttr, CompiledChild, CompiledNode, CompiledRoot, MixedPart, Template};
use crate::types::{Partial, Value};

use super::context::RenderedContext;
use super::{attribute, untrack_subtree, ChildSlot, CtxRef, EditOp, Editor, Inner, Occupant, SiblingEntry};

/// Instantiate a template against a partial's values.
///
/// The caller applies editors afterwards; build only wires them up.
pub(crate) fn build<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    template: &Template,
    partial: &Partial,
    reuse: Option<NodeId>,
) -> CtxRef {
    let mut editors: Vec<Editor> = Vec::new();

    let (root_cell, is_fragment) = match template.root() {
        CompiledRoot::Element(node) => {
            let (_, cell) = build_element(inner, node, partial, &mut editors, reuse);
            (cell, false)
        }
        CompiledRoot::Fragment(children) => {
            let fragment = inner.host.create_fragment();
            let cell = Rc::new(Cell::new(fragment));
            let siblings = Rc::new(RefCell::new(Vec::new()));
            build_children(
                inner,
                children,
                partial,
                &mut editors,
                fragment,
                &cell,
                &siblings,
                &mut None,
            );
            (cell, true)
        }
    };

    let ctx = RenderedContext::new(
        partial.key().clone(),
        root_cell,
        editors,
        template.slot_count(),
        false,
        is_fragment,
    );
    inner.contexts.insert(ctx.node(), ctx.clone());
    ctx
}

/// Children of a node, in order.
pub(crate) fn collect_children<H: HostTree + 'static>(inner: &Inner<H>, node: NodeId) -> Vec<NodeId> {
    let mut children = Vec::new();
    let mut cursor = inner.host.first_child(node);
    while let Some(child) = cursor {
        children.push(child);
        cursor = inner.host.next_sibling(child);
    }
    children
}

fn build_element<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    node: &CompiledNode,
    partial: &Partial,
    editors: &mut Vec<Editor>,
    reuse: Option<NodeId>,
) -> (NodeId, Rc<Cell<NodeId>>) {
    let adopted = reuse.filter(|old| {
        inner
            .host
            .tag(*old)
            .is_some_and(|tag| tag.eq_ignore_ascii_case(&node.tag))
    });

    let id = match adopted {
        Some(old) => {
            trace!(tag = %node.tag, "reusing existing element");
            strip_stale_attributes(inner, node, old);
            old
        }
        None => inner.host.create_element(&node.tag, node.namespace.as_deref()),
    };
    let cell = Rc::new(Cell::new(id));
    let siblings = Rc::new(RefCell::new(Vec::new()));

    for attr in &node.attributes {
        match attr {
            CompiledAttr::Static { name, value } => attribute::apply_attribute(
                inner,
                id,
                node.namespace.as_deref(),
                name,
                &Value::Text(value.to_string()),
                None,
            ),
            CompiledAttr::ValueSlot { name, index } => editors.push(Editor {
                index: *index,
                op: EditOp::AttrValue {
                    node: id,
                    name: name.clone(),
                    namespace: node.namespace.clone(),
                    last_ref: RefCell::new(None),
                },
            }),
            CompiledAttr::NameSlot { index, value } => editors.push(Editor {
                index: *index,
                op: EditOp::AttrName {
                    node: id,
                    value: value.clone(),
                    namespace: node.namespace.clone(),
                },
            }),
            CompiledAttr::Mixed { name, parts } => {
                for part in parts.iter() {
                    if let MixedPart::Slot(index) = part {
                        editors.push(Editor {
                            index: *index,
                            op: EditOp::AttrMixed {
                                node: id,
                                name: name.clone(),
                                parts: parts.clone(),
                                namespace: node.namespace.clone(),
                            },
                        });
                    }
                }
            }
        }
    }

    let mut old_children = adopted.map(|old| collect_children(inner, old));
    build_children(
        inner,
        &node.children,
        partial,
        editors,
        id,
        &cell,
        &siblings,
        &mut old_children,
    );

    // Old children nothing adopted are gone for good.
    if let Some(leftovers) = old_children {
        for old in leftovers {
            inner.host.remove_child(id, old);
            untrack_subtree(inner, old);
        }
    }

    (id, cell)
}

#[allow(clippy::too_many_arguments)]
fn build_children<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    children: &[CompiledChild],
    partial: &Partial,
    editors: &mut Vec<Editor>,
    parent: NodeId,
    parent_cell: &Rc<Cell<NodeId>>,
    siblings: &Rc<RefCell<Vec<SiblingEntry>>>,
    old_children: &mut Option<Vec<NodeId>>,
) {
    for child in children {
        match child {
            CompiledChild::Text(text) => {
                // Adopt the first unclaimed old text node, if any.
                // Appending moves adopted nodes to the end, which is also
                // what normalizes child order in reuse mode.
                let adopted = old_children.as_mut().and_then(|olds| {
                    olds.iter()
                        .position(|old| {
                            inner.host.is_text(*old) && !inner.contexts.contains_key(old)
                        })
                        .map(|pos| olds.remove(pos))
                });
                let id = match adopted {
                    Some(old) => {
                        inner.host.set_text(old, text);
                        old
                    }
                    None => inner.host.create_text(text),
                };
                inner.host.append_child(parent, id);
                siblings.borrow_mut().push(SiblingEntry::Fixed(id));
            }
            CompiledChild::Comment(text) => {
                let id = inner.host.create_comment(text);
                inner.host.append_child(parent, id);
                siblings.borrow_mut().push(SiblingEntry::Fixed(id));
            }
            CompiledChild::Element(nested) => {
                let candidate = old_children.as_mut().and_then(|olds| {
                    olds.iter()
                        .position(|old| {
                            !inner.contexts.contains_key(old)
                                && inner
                                    .host
                                    .tag(*old)
                                    .is_some_and(|tag| tag.eq_ignore_ascii_case(&nested.tag))
                        })
                        .map(|pos| olds.remove(pos))
                });
                let (id, _) = build_element(inner, nested, partial, editors, candidate);
                inner.host.append_child(parent, id);
                siblings.borrow_mut().push(SiblingEntry::Fixed(id));
            }
            CompiledChild::Slot(index) => {
                let value = &partial.values()[*index];

                // A partial value may claim a compatible old subtree up
                // front, skipping the placeholder entirely.
                let mut occupant = None;
                if let (Value::Partial(p), Some(olds)) = (value, old_children.as_mut()) {
                    if let Some(pos) = olds.iter().position(|old| {
                        inner
                            .contexts
                            .get(old)
                            .is_some_and(|c| &c.key == p.key() && !c.is_placeholder)
                    }) {
                        let old = olds.remove(pos);
                        inner.host.append_child(parent, old);
                        occupant = Some(Occupant::Node(old));
                    }
                }

                let occupant = occupant.unwrap_or_else(|| {
                    let marker = inner.host.create_comment("placeholder");
                    inner.host.append_child(parent, marker);
                    if let Value::Partial(p) = value {
                        // Key-compatible placeholder context, so mounting
                        // another view over this one can match the slot
                        // before it ever renders.
                        let placeholder = RenderedContext::new(
                            p.key().clone(),
                            Rc::new(Cell::new(marker)),
                            Vec::new(),
                            0,
                            true,
                            false,
                        );
                        inner.contexts.insert(marker, placeholder);
                    }
                    Occupant::Placeholder(marker)
                });

                let position = siblings.borrow().len();
                siblings.borrow_mut().push(SiblingEntry::Slot(occupant));
                editors.push(Editor {
                    index: *index,
                    op: EditOp::Child {
                        slot: ChildSlot {
                            parent: parent_cell.clone(),
                            position,
                            siblings: siblings.clone(),
                        },
                    },
                });
            }
        }
    }
}

/// Reuse mode: attributes the descriptor does not declare are stripped
/// from the adopted element before anything is applied.
fn strip_stale_attributes<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    node: &CompiledNode,
    old: NodeId,
) {
    let declared: Vec<String> = node
        .attributes
        .iter()
        .filter_map(|attr| match attr {
            CompiledAttr::Static { name, .. }
            | CompiledAttr::ValueSlot { name, .. }
            | CompiledAttr::Mixed { name, .. } => Some(normalized_name(name)),
            CompiledAttr::NameSlot { .. } => None,
        })
        .collect();

    for existing in inner.host.attribute_names(old) {
        if !declared.contains(&existing) {
            inner.host.remove_attribute(old, &existing);
        }
    }
}

fn normalized_name(name: &str) -> String {
    if name.eq_ignore_ascii_case("classname") {
        return "class".to_string();
    }
    if name == "htmlFor" {
        return "for".to_string();
    }
    name.to_string()
}
