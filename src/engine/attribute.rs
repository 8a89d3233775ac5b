//! Attribute application and attribute editors.
//!
//! All attribute writes funnel through [`apply_attribute`], which carries
//! the normalization rules: `className`/`htmlFor` aliases, boolean
//! presence (true renders the attribute named as its own value, false
//! removes it), direct-property placement for handler-like and
//! direct-table names, and namespaced placement on namespaced elements
//! (`xlink:href` goes to the xlink namespace, `xmlns` definitions are
//! skipped).
//!
//! Async attribute values defer through the owning context's pending set,
//! same as child slots.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{error, trace};

use crate::config::XLINK_NAMESPACE;
use crate::host::{HostTree, NodeId};
use crate::reference::Ref;
use crate::resolve::{unwind, Resolved};
use crate::template::MixedPart;
use crate::types::Value;

use super::{CtxRef, Inner};

/// Apply a terminal value to an attribute, with full normalization.
///
/// `element_namespace` is the owning element's namespace (placement
/// changes on namespaced elements); `last_ref` is the editor's ref slot
/// for uid transfer, absent for static attributes and deferred
/// continuations.
pub(crate) fn apply_attribute<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    node: NodeId,
    element_namespace: Option<&str>,
    name: &str,
    value: &Value,
    last_ref: Option<&RefCell<Option<Ref>>>,
) {
    let mut name = name.to_string();
    let mut key = name.to_ascii_lowercase();
    if key == "classname" {
        name = "class".to_string();
        key = "class".to_string();
    }
    if name == "htmlFor" {
        name = "for".to_string();
        key = "for".to_string();
    }

    match value {
        Value::Null => {
            inner.host.remove_attribute(node, &name);
            return;
        }
        Value::Ref(reference) => {
            bind_ref(inner, node, &name, reference, last_ref);
            return;
        }
        _ => {}
    }

    let Some(mut text) = value.as_text() else {
        panic!(
            "quilt: {} value cannot be applied to attribute {name}",
            value.kind()
        );
    };

    if inner.config.is_boolean_attribute(&key) {
        if text == "true" {
            text = key.clone();
        } else if text == "false" {
            inner.host.remove_attribute(node, &name);
            return;
        }
    }

    if inner.config.is_direct_property(&key) {
        inner.host.set_property(node, &name, value);
        return;
    }

    if element_namespace.is_some() {
        if name == "xlink:href" {
            inner.host.set_attribute_ns(node, Some(XLINK_NAMESPACE), &name, &text);
        } else if key == "xmlns" || key.starts_with("xmlns:") {
            // Namespace definitions belong to the creation call, not the
            // attribute store.
        } else {
            inner.host.set_attribute_ns(node, None, &name, &text);
        }
    } else {
        inner.host.set_attribute(node, &name, &text);
    }
}

/// Bind a ref used as an attribute value: transfer the previous pass's
/// uid onto it, write the uid as the attribute, and register it.
fn bind_ref<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    node: NodeId,
    name: &str,
    reference: &Ref,
    last_ref: Option<&RefCell<Option<Ref>>>,
) {
    if let Some(cell) = last_ref {
        let previous = cell.borrow().clone();
        if let Some(previous) = previous {
            reference.adopt_uid(&previous);
        }
        *cell.borrow_mut() = Some(reference.clone());
    }
    let uid = reference.uid();
    inner.host.set_attribute(node, name, &uid);
    inner.refs.insert(uid, node);
}

/// Editor for an attribute whose value is a single slot.
pub(crate) fn apply_value_editor<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    ctx: &CtxRef,
    node: NodeId,
    namespace: Option<Rc<str>>,
    name: Rc<str>,
    value: &Value,
    last_ref: &RefCell<Option<Ref>>,
) {
    match unwind(value.clone()) {
        Resolved::Now(value) => {
            apply_attribute(inner, node, namespace.as_deref(), &name, &value, Some(last_ref));
        }
        Resolved::Later(future) => {
            let token = inner.next_token();
            ctx.pending.borrow_mut().insert(token);
            let pending = ctx.pending.clone();
            let weak = inner.weak.clone();
            inner.spawn(async move {
                let result = future.await;
                let Some(cell) = weak.upgrade() else { return };
                if !pending.borrow_mut().remove(&token) {
                    trace!("stale async attribute value discarded");
                    return;
                }
                let mut inner = cell.borrow_mut();
                match result {
                    Ok(value) => {
                        apply_attribute(&mut inner, node, namespace.as_deref(), &name, &value, None);
                    }
                    Err(err) => error!(attribute = %name, "unhandled async rejection: {err}"),
                }
            });
        }
    }
}

/// Editor for an attribute whose name is a slot.
///
/// A scalar names one attribute, applied with the paired static value; an
/// attribute map spreads every pair; null is a no-op.
pub(crate) fn apply_name_editor<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    node: NodeId,
    element_namespace: Option<&str>,
    static_value: &str,
    value: &Value,
) {
    match value {
        Value::Null => {}
        Value::Attributes(pairs) => {
            for (name, value) in pairs {
                apply_attribute(inner, node, element_namespace, name, value, None);
            }
        }
        scalar if scalar.is_scalar() => {
            let name = scalar.as_text().unwrap();
            apply_attribute(
                inner,
                node,
                element_namespace,
                &name,
                &Value::Text(static_value.to_string()),
                None,
            );
        }
        other => panic!("quilt: {} value cannot name an attribute", other.kind()),
    }
}

/// Editor for one slot of a mixed attribute value: re-concatenate the
/// whole value from the current value list and apply it.
pub(crate) fn apply_mixed_editor<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    node: NodeId,
    element_namespace: Option<&str>,
    name: &str,
    parts: &Rc<[MixedPart]>,
    values: &[Value],
) {
    let mut text = String::new();
    for part in parts.iter() {
        match part {
            MixedPart::Literal(literal) => text.push_str(literal),
            MixedPart::Slot(index) => {
                if let Some(piece) = values[*index].as_text() {
                    text.push_str(&piece);
                }
            }
        }
    }
    apply_attribute(inner, node, element_namespace, name, &Value::Text(text), None);
}
