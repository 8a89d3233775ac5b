//! Rendering engine - stores, top-level render, editor application.
//!
//! An [`Engine`] owns everything the reconciliation core shares between
//! renders: the compiled-template cache, the node → context side table,
//! the ref registry, the pending-render table for top-level supersession,
//! and a single-threaded task pool that drives deferred async
//! continuations.
//!
//! # Render flow
//!
//! ```text
//! render(partial, target?)
//!   ├─ target bound to a compatible context → apply editors (patch)
//!   └─ otherwise → compile (cached) → build subtree → apply editors
//!        └─ target given → splice over it (replace, or clear-and-append
//!           for fragment roots)
//! ```
//!
//! A render with async content returns [`Rendered::Pending`]; the prior
//! (or placeholder) output stays in place until the engine's pool resolves
//! the value. Re-rendering the same target first clears its pending state,
//! so a stale continuation that fires later is inert - superseding is the
//! only cancellation mechanism, and it is implicit.

mod attribute;
mod build;
mod child;
mod context;
mod list;

pub use context::{PendingToken, RenderedContext};

pub(crate) use context::{ChildSlot, CtxRef, EditOp, Editor, ListEntry, Occupant, SiblingEntry};

use std::cell::RefCell;
use std::collections::HashMap;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use futures_channel::oneshot;
use tracing::{error, trace, warn};

use crate::config::EngineConfig;
use crate::error::{AsyncError, CompileError};
use crate::host::{HostTree, NodeId};
use crate::reference::Ref;
use crate::resolve::{unwind, Resolved};
use crate::template::{compile, Structure, Template, TemplateId};
use crate::types::{Partial, PartialKey, Value};

// =============================================================================
// Render result
// =============================================================================

/// Outcome of a render call.
pub enum Rendered {
    /// The render completed synchronously.
    Node(NodeId),
    /// The render is waiting on async content; the handle completes when
    /// it lands (or resolves to `None` if a later render superseded it).
    Pending(PendingRender),
}

impl Rendered {
    /// Unwrap the synchronous result.
    ///
    /// # Panics
    ///
    /// Panics if the render is pending.
    pub fn node(self) -> NodeId {
        match self {
            Rendered::Node(node) => node,
            Rendered::Pending(_) => panic!("quilt: render is pending; drive the engine pool"),
        }
    }

    /// Whether the render is still pending.
    pub fn is_pending(&self) -> bool {
        matches!(self, Rendered::Pending(_))
    }
}

/// Future side of a pending top-level render.
///
/// Resolves to `Ok(Some(node))` when the render lands, `Ok(None)` when a
/// later render on the same target superseded it, and `Err` when the
/// top-level async value rejected.
pub struct PendingRender {
    receiver: oneshot::Receiver<Result<NodeId, AsyncError>>,
}

impl std::future::Future for PendingRender {
    type Output = Result<Option<NodeId>, AsyncError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| match received {
            Ok(Ok(node)) => Ok(Some(node)),
            Ok(Err(error)) => Err(error),
            // Sender dropped: the render was superseded.
            Err(_) => Ok(None),
        })
    }
}

// =============================================================================
// Engine
// =============================================================================

pub(crate) struct Inner<H: HostTree> {
    pub(crate) host: H,
    pub(crate) config: EngineConfig,
    pub(crate) templates: HashMap<TemplateId, Result<Rc<Template>, CompileError>>,
    pub(crate) contexts: HashMap<NodeId, CtxRef>,
    pub(crate) refs: HashMap<String, NodeId>,
    pending_renders: HashMap<NodeId, PendingToken>,
    token_counter: PendingToken,
    spawner: LocalSpawner,
    pub(crate) weak: Weak<RefCell<Inner<H>>>,
}

impl<H: HostTree> Inner<H> {
    pub(crate) fn next_token(&mut self) -> PendingToken {
        self.token_counter += 1;
        self.token_counter
    }

    pub(crate) fn spawn(&self, task: impl std::future::Future<Output = ()> + 'static) {
        if self.spawner.spawn_local(task).is_err() {
            warn!("engine task pool is gone; dropping async continuation");
        }
    }
}

/// The rendering engine.
///
/// Cheap to clone; clones share the same stores, host and task pool.
///
/// # Example
///
/// ```ignore
/// use quilt::{Engine, MemoryTree, Partial};
/// use quilt::template::element;
///
/// let greeting = element("div").text("Hello ").slot(0).into_structure();
/// let engine = Engine::new(MemoryTree::new());
///
/// let node = engine
///     .render(Partial::new(&greeting, vec!["planet".into()]), None)
///     .node();
/// engine.render(Partial::new(&greeting, vec!["world".into()]), Some(node));
/// ```
pub struct Engine<H: HostTree + 'static> {
    inner: Rc<RefCell<Inner<H>>>,
    pool: Rc<RefCell<LocalPool>>,
}

impl<H: HostTree + 'static> Clone for Engine<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            pool: self.pool.clone(),
        }
    }
}

impl<H: HostTree + 'static> Engine<H> {
    /// Create an engine over a host tree with default configuration.
    pub fn new(host: H) -> Self {
        Self::with_config(host, EngineConfig::default())
    }

    /// Create an engine with explicit lookup tables.
    pub fn with_config(host: H, config: EngineConfig) -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        let inner = Rc::new_cyclic(|weak| {
            RefCell::new(Inner {
                host,
                config,
                templates: HashMap::new(),
                contexts: HashMap::new(),
                refs: HashMap::new(),
                pending_renders: HashMap::new(),
                token_counter: 0,
                spawner,
                weak: weak.clone(),
            })
        });
        Self {
            inner,
            pool: Rc::new(RefCell::new(pool)),
        }
    }

    /// Compile (or fetch the cached compilation of) a structure.
    ///
    /// Failures are cached too and re-raised on every call.
    pub fn compile(&self, structure: &Rc<Structure>) -> Result<Rc<Template>, CompileError> {
        get_or_compile(&mut self.inner.borrow_mut(), structure)
    }

    /// Render a value onto an optional target node.
    ///
    /// See the module docs for the patch/fresh/splice decision. The value
    /// must resolve to a partial; anything else is a caller bug.
    pub fn render(&self, value: impl Into<Value>, target: Option<NodeId>) -> Rendered {
        let value = value.into();
        let mut inner = self.inner.borrow_mut();

        // A new render on this target supersedes any in-flight one.
        if let Some(target) = target {
            inner.pending_renders.remove(&target);
        }

        match unwind(value) {
            Resolved::Now(value) => Rendered::Node(render_now(&mut inner, value, target)),
            Resolved::Later(future) => {
                let token = inner.next_token();
                if let Some(target) = target {
                    inner.pending_renders.insert(target, token);
                }
                let (sender, receiver) = oneshot::channel();
                let weak = inner.weak.clone();
                inner.spawn(async move {
                    let result = future.await;
                    let Some(cell) = weak.upgrade() else { return };
                    let mut inner = cell.borrow_mut();
                    match result {
                        Err(error) => {
                            error!("top-level async render rejected: {error}");
                            let _ = sender.send(Err(error));
                        }
                        Ok(value) => {
                            if let Some(target) = target {
                                if inner.pending_renders.get(&target) != Some(&token) {
                                    trace!("superseded async render discarded");
                                    return;
                                }
                                inner.pending_renders.remove(&target);
                            }
                            let node = render_now(&mut inner, value, target);
                            let _ = sender.send(Ok(node));
                        }
                    }
                });
                Rendered::Pending(PendingRender { receiver })
            }
        }
    }

    /// Drive the engine's task pool until no continuation can make
    /// progress. Returns immediately when nothing is pending.
    pub fn run_until_stalled(&self) {
        self.pool.borrow_mut().run_until_stalled();
    }

    /// Remove a rendered subtree from the output tree and tear down its
    /// side-table state.
    pub fn unmount(&self, node: NodeId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(parent) = inner.host.parent(node) {
            inner.host.remove_child(parent, node);
        }
        inner.pending_renders.remove(&node);
        untrack_subtree(&mut inner, node);
    }

    /// Inspect the host tree.
    pub fn with_host<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        f(&self.inner.borrow().host)
    }

    /// Mutate the host tree directly (tests, embedder setup).
    pub fn with_host_mut<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(&mut self.inner.borrow_mut().host)
    }

    /// The key a node was rendered under, if the engine tracks it.
    pub fn rendered_key(&self, node: NodeId) -> Option<PartialKey> {
        self.inner
            .borrow()
            .contexts
            .get(&node)
            .map(|ctx| ctx.key.clone())
    }

    /// Resolve a ref to the node registered under its uid.
    ///
    /// # Panics
    ///
    /// Panics if the uid has never been bound by a render, or its node has
    /// been removed.
    pub fn resolve_ref(&self, reference: &Ref) -> NodeId {
        let inner = self.inner.borrow();
        let uid = reference.uid();
        match inner.refs.get(&uid) {
            Some(node) => *node,
            None => panic!("quilt: ref {uid} is not bound to a rendered node"),
        }
    }

    /// Read an attribute of a ref's node.
    pub fn ref_attribute(&self, reference: &Ref, name: &str) -> Option<String> {
        let node = self.resolve_ref(reference);
        self.inner.borrow().host.attribute(node, name)
    }

    /// Write an attribute of a ref's node, with normal attribute
    /// normalization.
    pub fn set_ref_attribute(&self, reference: &Ref, name: &str, value: &Value) {
        let node = self.resolve_ref(reference);
        let mut inner = self.inner.borrow_mut();
        attribute::apply_attribute(&mut inner, node, None, name, value, None);
    }
}

// =============================================================================
// Render internals
// =============================================================================

fn get_or_compile<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    structure: &Rc<Structure>,
) -> Result<Rc<Template>, CompileError> {
    if let Some(cached) = inner.templates.get(&structure.id()) {
        trace!(template = %structure.id(), "template cache hit");
        return cached.clone();
    }
    let result = compile(structure, &inner.config).map(Rc::new);
    inner.templates.insert(structure.id(), result.clone());
    result
}

/// Render an already-resolved value onto the target.
pub(crate) fn render_now<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    value: Value,
    target: Option<NodeId>,
) -> NodeId {
    let Value::Partial(partial) = value else {
        panic!("quilt: render requires a partial value, got {}", value.kind());
    };

    // Patch path: compatible context on the target.
    if let Some(target) = target {
        if let Some(ctx) = inner.contexts.get(&target).cloned() {
            if &ctx.key == partial.key() && !ctx.is_placeholder {
                trace!(key = %ctx.key, "patching in place");
                apply_editors(inner, &ctx, partial.values());
                return target;
            }
        }
    }

    // Fresh path: build (reusing the target as a hint) and splice.
    let ctx = render_partial(inner, &partial, target);
    let root = ctx.node();

    let Some(target) = target else { return root };
    if inner.host.same_node(root, target) {
        return root;
    }

    if ctx.is_fragment {
        // Fragment roots clear the target and adopt it as their node.
        let mut doomed = Vec::new();
        let mut cursor = inner.host.first_child(target);
        while let Some(child) = cursor {
            cursor = inner.host.next_sibling(child);
            doomed.push(child);
        }
        for child in doomed {
            inner.host.remove_child(target, child);
            untrack_subtree(inner, child);
        }
        inner.host.append_child(target, root);
        inner.contexts.remove(&root);
        ctx.root.set(target);
        inner.contexts.insert(target, ctx);
        target
    } else if let Some(parent) = inner.host.parent(target) {
        inner.host.replace_child(parent, root, target);
        untrack_subtree(inner, target);
        root
    } else {
        warn!("render target has no parent; leaving fresh subtree detached");
        root
    }
}

/// Compile, build and apply a partial, returning its context.
pub(crate) fn render_partial<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    partial: &Partial,
    reuse: Option<NodeId>,
) -> CtxRef {
    let template = match get_or_compile(inner, partial.structure()) {
        Ok(template) => template,
        Err(error) => panic!("quilt: template failed to compile: {error}"),
    };
    assert_eq!(
        partial.values().len(),
        template.slot_count(),
        "quilt: number of values ({}) must match number of slots ({})",
        partial.values().len(),
        template.slot_count(),
    );

    let ctx = build::build(inner, &template, partial, reuse);
    apply_editors(inner, &ctx, partial.values());
    ctx
}

/// Apply a context's editors to a value list, strictly in ascending slot
/// order. Clears the pending set first: any continuation the previous
/// pass left in flight is now stale.
pub(crate) fn apply_editors<H: HostTree + 'static>(
    inner: &mut Inner<H>,
    ctx: &CtxRef,
    values: &[Value],
) {
    assert_eq!(
        values.len(),
        ctx.slot_count,
        "quilt: number of values ({}) must match number of slots ({})",
        values.len(),
        ctx.slot_count,
    );

    ctx.pending.borrow_mut().clear();

    for editor in &ctx.editors {
        let value = &values[editor.index];
        match &editor.op {
            EditOp::AttrValue {
                node,
                name,
                namespace,
                last_ref,
            } => attribute::apply_value_editor(
                inner,
                ctx,
                *node,
                namespace.clone(),
                name.clone(),
                value,
                last_ref,
            ),
            EditOp::AttrName {
                node,
                value: static_value,
                namespace,
            } => attribute::apply_name_editor(
                inner,
                *node,
                namespace.as_deref(),
                static_value,
                value,
            ),
            EditOp::AttrMixed {
                node,
                name,
                parts,
                namespace,
            } => attribute::apply_mixed_editor(
                inner,
                *node,
                namespace.as_deref(),
                name,
                parts,
                values,
            ),
            EditOp::Child { slot } => child::update_slot(inner, ctx, slot, value),
        }
    }
}

/// Drop side-table state for a removed subtree: contexts and ref
/// bindings. Called after a node leaves the output tree.
pub(crate) fn untrack_subtree<H: HostTree + 'static>(inner: &mut Inner<H>, node: NodeId) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        inner.contexts.remove(&current);
        inner.refs.retain(|_, bound| *bound != current);
        let mut child = inner.host.first_child(current);
        while let Some(c) = child {
            stack.push(c);
            child = inner.host.next_sibling(c);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryTree;
    use crate::reference::Ref;
    use crate::resolve::{Resumable, ResumableValue, Step, ValueFuture};
    use crate::template::{element, fragment, AttrChunk};
    use futures::executor::block_on;
    use futures_channel::oneshot as value_channel;

    fn engine() -> Engine<MemoryTree> {
        Engine::new(MemoryTree::new())
    }

    fn html(engine: &Engine<MemoryTree>, node: NodeId) -> String {
        engine.with_host(|host| host.outer_html(node))
    }

    fn children(engine: &Engine<MemoryTree>, node: NodeId) -> Vec<NodeId> {
        engine.with_host(|host| host.children(node))
    }

    /// A slot future the test body resolves by hand.
    fn deferred_value() -> (value_channel::Sender<Value>, ValueFuture) {
        let (sender, receiver) = value_channel::channel();
        let future = ValueFuture::new(async move {
            receiver
                .await
                .map_err(|_| AsyncError::new("value sender dropped"))
        });
        (sender, future)
    }

    // =========================================================================
    // Patch vs replace
    // =========================================================================

    #[test]
    fn test_render_and_patch_preserves_node_identity() {
        let greeting = element("div")
            .child(element("span").text("Hello ").slot(0).text("!"))
            .into_structure();
        let engine = engine();

        let root = engine
            .render(Partial::new(&greeting, vec!["planet".into()]), None)
            .node();
        assert_eq!(html(&engine, root), "<div><span>Hello planet!</span></div>");

        let span = children(&engine, root)[0];
        let patched = engine
            .render(Partial::new(&greeting, vec!["world".into()]), Some(root))
            .node();

        assert_eq!(patched, root, "compatible partial must not replace the root");
        assert_eq!(
            children(&engine, root)[0],
            span,
            "the span must be the same node object"
        );
        assert_eq!(html(&engine, root), "<div><span>Hello world!</span></div>");
    }

    #[test]
    fn test_incompatible_partial_replaces_node() {
        let first = element("div").slot(0).into_structure();
        let second = element("section").slot(0).into_structure();
        let engine = engine();

        let container = engine.with_host_mut(|host| host.create_element("main", None));
        let root = engine
            .render(Partial::new(&first, vec!["a".into()]), None)
            .node();
        engine.with_host_mut(|host| host.append_child(container, root));

        let replaced = engine
            .render(Partial::new(&second, vec!["b".into()]), Some(root))
            .node();

        assert_ne!(replaced, root, "incompatible partial must replace the node");
        assert_eq!(children(&engine, container), vec![replaced]);
        assert_eq!(html(&engine, container), "<main><section>b</section></main>");
        assert_eq!(
            engine.rendered_key(root),
            None,
            "replaced subtree must be untracked"
        );
    }

    #[test]
    fn test_rerender_with_identical_partial_is_idempotent() {
        let structure = element("div")
            .attribute_slot("title", 0)
            .slot(1)
            .into_structure();
        let engine = engine();

        let root = engine
            .render(Partial::new(&structure, vec!["t".into(), "x".into()]), None)
            .node();
        let snapshot = html(&engine, root);
        let child_ids = children(&engine, root);

        let again = engine
            .render(Partial::new(&structure, vec!["t".into(), "x".into()]), Some(root))
            .node();

        assert_eq!(again, root);
        assert_eq!(html(&engine, root), snapshot);
        assert_eq!(children(&engine, root), child_ids, "no structural mutation");
    }

    #[test]
    fn test_nested_partial_patch_vs_replace() {
        let outer = element("div").slot(0).into_structure();
        let emphasis = element("em").slot(0).into_structure();
        let strong = element("strong").slot(0).into_structure();
        let engine = engine();

        let root = engine
            .render(
                Partial::new(&outer, vec![Partial::new(&emphasis, vec!["x".into()]).into()]),
                None,
            )
            .node();
        assert_eq!(html(&engine, root), "<div><em>x</em></div>");
        let em = children(&engine, root)[0];

        engine.render(
            Partial::new(&outer, vec![Partial::new(&emphasis, vec!["y".into()]).into()]),
            Some(root),
        );
        assert_eq!(html(&engine, root), "<div><em>y</em></div>");
        assert_eq!(children(&engine, root)[0], em, "compatible child patches in place");

        engine.render(
            Partial::new(&outer, vec![Partial::new(&strong, vec!["z".into()]).into()]),
            Some(root),
        );
        assert_eq!(html(&engine, root), "<div><strong>z</strong></div>");
        assert_ne!(children(&engine, root)[0], em, "incompatible child replaces");
    }

    #[test]
    fn test_null_child_removed_and_reinserted_in_position() {
        let structure = element("div").text("a").slot(0).text("b").into_structure();
        let engine = engine();

        let root = engine
            .render(Partial::new(&structure, vec!["X".into()]), None)
            .node();
        assert_eq!(html(&engine, root), "<div>aXb</div>");

        engine.render(Partial::new(&structure, vec![Value::Null]), Some(root));
        assert_eq!(html(&engine, root), "<div>ab</div>");

        engine.render(Partial::new(&structure, vec!["Y".into()]), Some(root));
        assert_eq!(
            html(&engine, root),
            "<div>aYb</div>",
            "re-inserted child must land back between its siblings"
        );
    }

    #[test]
    fn test_scalar_values_stringify() {
        let structure = element("p").slot(0).into_structure();
        let engine = engine();

        let root = engine
            .render(Partial::new(&structure, vec![Value::Int(42)]), None)
            .node();
        assert_eq!(html(&engine, root), "<p>42</p>");

        let text_node = children(&engine, root)[0];
        engine.render(
            Partial::new(&structure, vec![Value::display(3.5f64)]),
            Some(root),
        );
        assert_eq!(html(&engine, root), "<p>3.5</p>");
        assert_eq!(
            children(&engine, root)[0],
            text_node,
            "text content mutates in place, no node replacement"
        );
    }

    // =========================================================================
    // Template cache
    // =========================================================================

    #[test]
    fn test_template_compiled_exactly_once() {
        let structure = element("div").slot(0).into_structure();
        let engine = engine();

        let first = engine.compile(&structure).unwrap();
        let second = engine.compile(&structure).unwrap();
        assert!(
            Rc::ptr_eq(&first, &second),
            "same identity must return the cached template"
        );
    }

    #[test]
    fn test_compile_failure_cached_and_reraised() {
        let broken = element("div").slot(0).slot(0).into_structure();
        let engine = engine();

        let first = engine.compile(&broken).unwrap_err();
        let second = engine.compile(&broken).unwrap_err();
        assert_eq!(first, second);
        assert_eq!(first, CompileError::DuplicateSlot { index: 0 });
    }

    #[test]
    #[should_panic(expected = "number of values (1) must match number of slots (2)")]
    fn test_value_count_mismatch_fails_fast() {
        let structure = element("div").slot(0).slot(1).into_structure();
        let engine = engine();
        engine.render(Partial::new(&structure, vec!["only one".into()]), None);
    }

    // =========================================================================
    // Editor ordering
    // =========================================================================

    #[test]
    fn test_editors_apply_in_ascending_slot_order() {
        // Slot 1 is declared before slot 0; application must still run 0
        // first.
        let structure = element("div")
            .attribute_slot("b", 1)
            .attribute_slot("a", 0)
            .into_structure();
        let engine = engine();

        engine.render(
            Partial::new(&structure, vec!["first".into(), "second".into()]),
            None,
        );

        let ops = engine.with_host(|host| host.ops.clone());
        let a_at = ops.iter().position(|op| op.contains(" a=")).unwrap();
        let b_at = ops.iter().position(|op| op.contains(" b=")).unwrap();
        assert!(
            a_at < b_at,
            "slot 0 editor must run before slot 1 editor, ops: {ops:?}"
        );
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    #[test]
    fn test_boolean_attribute_presence_rules() {
        let structure = element("button").attribute_slot("disabled", 0).into_structure();
        let engine = engine();

        let root = engine
            .render(Partial::new(&structure, vec![true.into()]), None)
            .node();
        assert_eq!(
            engine.with_host(|host| host.attribute(root, "disabled")),
            Some("disabled".to_string()),
            "true renders the attribute with its own name as value"
        );

        engine.render(Partial::new(&structure, vec![false.into()]), Some(root));
        assert_eq!(
            engine.with_host(|host| host.attribute(root, "disabled")),
            None,
            "false removes the attribute entirely"
        );
    }

    #[test]
    fn test_mixed_attribute_reconcatenates() {
        let structure = element("div")
            .attribute_parts(
                "class",
                vec![AttrChunk::slot(0), AttrChunk::literal(" "), AttrChunk::slot(1)],
            )
            .into_structure();
        let engine = engine();

        let root = engine
            .render(Partial::new(&structure, vec!["hero".into(), "wide".into()]), None)
            .node();
        assert_eq!(
            engine.with_host(|host| host.attribute(root, "class")),
            Some("hero wide".to_string())
        );

        engine.render(
            Partial::new(&structure, vec!["hero".into(), "narrow".into()]),
            Some(root),
        );
        assert_eq!(
            engine.with_host(|host| host.attribute(root, "class")),
            Some("hero narrow".to_string()),
            "the unchanged part must still be incorporated"
        );
    }

    #[test]
    fn test_class_name_aliases_normalize() {
        let structure = element("label")
            .attribute("className", "box")
            .attribute_slot("htmlFor", 0)
            .into_structure();
        let engine = engine();

        let root = engine
            .render(Partial::new(&structure, vec!["field".into()]), None)
            .node();
        assert_eq!(
            engine.with_host(|host| host.attribute(root, "class")),
            Some("box".to_string())
        );
        assert_eq!(
            engine.with_host(|host| host.attribute(root, "for")),
            Some("field".to_string())
        );
    }

    #[test]
    fn test_handler_and_direct_properties_bypass_attributes() {
        let structure = element("input")
            .attribute_slot("onclick", 0)
            .attribute_slot("indeterminate", 1)
            .into_structure();
        let engine = engine();

        let root = engine
            .render(
                Partial::new(&structure, vec!["go()".into(), true.into()]),
                None,
            )
            .node();

        assert_eq!(
            engine.with_host(|host| host.property(root, "onclick")),
            Some("go()".to_string())
        );
        assert_eq!(engine.with_host(|host| host.attribute(root, "onclick")), None);
        assert_eq!(
            engine.with_host(|host| host.property(root, "indeterminate")),
            Some("true".to_string())
        );
    }

    #[test]
    fn test_attribute_name_slot_and_spread() {
        let structure = element("div").attribute_name_slot(0).into_structure();
        let engine = engine();

        let root = engine
            .render(Partial::new(&structure, vec!["data-x".into()]), None)
            .node();
        assert_eq!(
            engine.with_host(|host| host.attribute(root, "data-x")),
            Some(String::new()),
            "a scalar names an attribute carrying the paired static value"
        );

        engine.render(
            Partial::new(
                &structure,
                vec![Value::Attributes(vec![
                    ("id".to_string(), "a1".into()),
                    ("title".to_string(), "greeting".into()),
                ])],
            ),
            Some(root),
        );
        assert_eq!(
            engine.with_host(|host| host.attribute(root, "id")),
            Some("a1".to_string())
        );
        assert_eq!(
            engine.with_host(|host| host.attribute(root, "title")),
            Some("greeting".to_string())
        );
    }

    #[test]
    fn test_namespaced_attribute_placement() {
        let structure = element("use")
            .attribute("xmlns", "http://www.w3.org/2000/svg")
            .attribute_slot("xlink:href", 0)
            .into_structure();
        let engine = engine();

        let root = engine
            .render(Partial::new(&structure, vec!["#icon".into()]), None)
            .node();

        assert_eq!(
            engine.with_host(|host| host.attribute(root, "xlink:href")),
            Some("#icon".to_string())
        );
        assert_eq!(
            engine.with_host(|host| host.attribute(root, "xmlns")),
            None,
            "xmlns definitions are skipped"
        );
        let xlink_op = engine.with_host(|host| {
            host.ops
                .iter()
                .any(|op| op.contains("attr-ns") && op.contains(crate::config::XLINK_NAMESPACE))
        });
        assert!(xlink_op, "xlink:href must go through the namespaced call");
    }

    // =========================================================================
    // Keyed lists
    // =========================================================================

    fn item_partial(
        structure: &Rc<crate::template::Structure>,
        key: &str,
        label: &str,
    ) -> Value {
        Partial::new(structure, vec![label.into()]).keyed(key).into()
    }

    #[test]
    fn test_keyed_list_reversal_reuses_every_node() {
        let item = element("li").slot(0).into_structure();
        let list = element("ul").slot(0).into_structure();
        let engine = engine();

        let root = engine
            .render(
                Partial::new(
                    &list,
                    vec![Value::List(vec![
                        item_partial(&item, "a", "A"),
                        item_partial(&item, "b", "B"),
                        item_partial(&item, "c", "C"),
                    ])],
                ),
                None,
            )
            .node();
        assert_eq!(html(&engine, root), "<ul><li>A</li><li>B</li><li>C</li></ul>");
        let before = children(&engine, root);

        engine.render(
            Partial::new(
                &list,
                vec![Value::List(vec![
                    item_partial(&item, "c", "C"),
                    item_partial(&item, "b", "B"),
                    item_partial(&item, "a", "A"),
                ])],
            ),
            Some(root),
        );

        let after = children(&engine, root);
        assert_eq!(html(&engine, root), "<ul><li>C</li><li>B</li><li>A</li></ul>");
        assert_eq!(
            after,
            vec![before[2], before[1], before[0]],
            "reversal must reorder the same node objects"
        );
    }

    #[test]
    fn test_keyed_list_insert_and_remove() {
        let item = element("li").slot(0).into_structure();
        let list = element("ul").slot(0).into_structure();
        let engine = engine();

        let root = engine
            .render(
                Partial::new(
                    &list,
                    vec![Value::List(vec![
                        item_partial(&item, "a", "A"),
                        item_partial(&item, "b", "B"),
                        item_partial(&item, "c", "C"),
                    ])],
                ),
                None,
            )
            .node();
        let before = children(&engine, root);

        engine.render(
            Partial::new(
                &list,
                vec![Value::List(vec![
                    item_partial(&item, "a", "A"),
                    item_partial(&item, "c", "C"),
                    item_partial(&item, "d", "D"),
                ])],
            ),
            Some(root),
        );

        let after = children(&engine, root);
        assert_eq!(html(&engine, root), "<ul><li>A</li><li>C</li><li>D</li></ul>");
        assert_eq!(after[0], before[0], "kept key reuses its node");
        assert_eq!(after[1], before[2], "kept key reuses its node across a removal");
        assert!(!after.contains(&before[1]), "removed key's node is gone");
    }

    #[test]
    fn test_list_flattens_nested_arrays() {
        let list = element("ul").slot(0).into_structure();
        let engine = engine();

        let root = engine
            .render(
                Partial::new(
                    &list,
                    vec![Value::List(vec![
                        "1".into(),
                        Value::List(vec!["2".into(), Value::List(vec!["3".into()])]),
                        "4".into(),
                    ])],
                ),
                None,
            )
            .node();
        assert_eq!(html(&engine, root), "<ul>1234</ul>");
    }

    #[test]
    fn test_list_to_scalar_and_back() {
        let structure = element("div").slot(0).into_structure();
        let item = element("i").slot(0).into_structure();
        let engine = engine();

        let root = engine
            .render(
                Partial::new(
                    &structure,
                    vec![Value::List(vec![
                        item_partial(&item, "a", "A"),
                        item_partial(&item, "b", "B"),
                    ])],
                ),
                None,
            )
            .node();
        assert_eq!(html(&engine, root), "<div><i>A</i><i>B</i></div>");

        engine.render(Partial::new(&structure, vec!["flat".into()]), Some(root));
        assert_eq!(html(&engine, root), "<div>flat</div>");

        engine.render(
            Partial::new(
                &structure,
                vec![Value::List(vec![item_partial(&item, "a", "A")])],
            ),
            Some(root),
        );
        assert_eq!(html(&engine, root), "<div><i>A</i></div>");
    }

    // =========================================================================
    // Async values
    // =========================================================================

    #[test]
    fn test_async_child_keeps_placeholder_then_fills_in_position() {
        let structure = element("div").text("start").slot(0).text("end").into_structure();
        let late = element("em").text("late").into_structure();
        let engine = engine();

        let (sender, future) = deferred_value();
        let root = engine
            .render(Partial::new(&structure, vec![future.into()]), None)
            .node();
        assert_eq!(
            html(&engine, root),
            "<div>start<!--placeholder-->end</div>",
            "slot holds its placeholder while pending"
        );

        sender
            .send(Partial::new(&late, vec![]).into())
            .expect("continuation must be waiting");
        engine.run_until_stalled();

        assert_eq!(
            html(&engine, root),
            "<div>start<em>late</em>end</div>",
            "resolved content must land in the slot's position"
        );
    }

    #[test]
    fn test_async_update_keeps_previous_occupant_until_resolution() {
        let structure = element("div").slot(0).into_structure();
        let engine = engine();

        let root = engine
            .render(Partial::new(&structure, vec!["old".into()]), None)
            .node();

        let (sender, future) = deferred_value();
        engine.render(Partial::new(&structure, vec![future.into()]), Some(root));
        assert_eq!(
            html(&engine, root),
            "<div>old</div>",
            "prior occupant stays until the value resolves"
        );

        sender.send("new".into()).unwrap();
        engine.run_until_stalled();
        assert_eq!(html(&engine, root), "<div>new</div>");
    }

    #[test]
    fn test_stale_async_resolution_has_no_effect() {
        let structure = element("div").slot(0).into_structure();
        let engine = engine();

        let (sender, future) = deferred_value();
        let root = engine
            .render(Partial::new(&structure, vec![future.into()]), None)
            .node();

        // A synchronous render supersedes the in-flight value.
        engine.render(Partial::new(&structure, vec!["sync".into()]), Some(root));
        assert_eq!(html(&engine, root), "<div>sync</div>");

        sender.send("late".into()).unwrap();
        engine.run_until_stalled();
        assert_eq!(
            html(&engine, root),
            "<div>sync</div>",
            "stale continuation must be inert"
        );
    }

    #[test]
    fn test_async_list_item_preserves_sibling_order() {
        let list = element("ol").slot(0).into_structure();
        let engine = engine();

        let (sender, future) = deferred_value();
        let root = engine
            .render(
                Partial::new(
                    &list,
                    vec![Value::List(vec!["1".into(), future.into(), "3".into()])],
                ),
                None,
            )
            .node();
        assert_eq!(html(&engine, root), "<ol>13</ol>");

        sender.send("2".into()).unwrap();
        engine.run_until_stalled();
        assert_eq!(html(&engine, root), "<ol>123</ol>", "item lands at its reserved position");
    }

    #[test]
    fn test_async_top_level_render_and_supersession() {
        let structure = element("div").slot(0).into_structure();
        let engine = engine();

        let root = engine
            .render(Partial::new(&structure, vec!["first".into()]), None)
            .node();

        let (sender, future) = deferred_value();
        let pending = engine.render(Value::Future(future), Some(root));
        assert!(pending.is_pending());

        // Later synchronous render wins.
        engine.render(Partial::new(&structure, vec!["second".into()]), Some(root));

        sender
            .send(Partial::new(&structure, vec!["late".into()]).into())
            .unwrap();
        engine.run_until_stalled();

        assert_eq!(html(&engine, root), "<div>second</div>");
        let Rendered::Pending(handle) = pending else { unreachable!() };
        assert_eq!(
            block_on(handle).unwrap(),
            None,
            "superseded render resolves to None"
        );
    }

    #[test]
    fn test_async_top_level_render_lands() {
        let structure = element("div").slot(0).into_structure();
        let engine = engine();

        let (sender, future) = deferred_value();
        let pending = engine.render(Value::Future(future), None);
        sender
            .send(Partial::new(&structure, vec!["async".into()]).into())
            .unwrap();
        engine.run_until_stalled();

        let Rendered::Pending(handle) = pending else { unreachable!() };
        let node = block_on(handle).unwrap().expect("render must land");
        assert_eq!(html(&engine, node), "<div>async</div>");
    }

    #[test]
    fn test_async_rejection_surfaces_through_handle() {
        let engine = engine();
        let future = ValueFuture::rejected(AsyncError::new("backend down"));
        let pending = engine.render(Value::Future(future), None);
        engine.run_until_stalled();

        let Rendered::Pending(handle) = pending else { unreachable!() };
        let error = block_on(handle).unwrap_err();
        assert_eq!(error.to_string(), "async value rejected: backend down");
    }

    /// Resumable producing a suspension before its final content.
    struct LateGreeting {
        started: bool,
    }

    impl Resumable for LateGreeting {
        fn step(&mut self, input: Value) -> Step {
            if !self.started {
                self.started = true;
                return Step::Suspended(ValueFuture::ready(Value::Text("deferred".into())));
            }
            Step::Done(Value::Text(format!(
                "{} greeting",
                input.as_text().unwrap_or_default()
            )))
        }
    }

    #[test]
    fn test_resumable_value_in_child_slot() {
        let structure = element("div").slot(0).into_structure();
        let engine = engine();

        let root = engine
            .render(
                Partial::new(
                    &structure,
                    vec![ResumableValue::new(LateGreeting { started: false }).into()],
                ),
                None,
            )
            .node();
        engine.run_until_stalled();

        assert_eq!(html(&engine, root), "<div>deferred greeting</div>");
    }

    // =========================================================================
    // Refs
    // =========================================================================

    #[test]
    fn test_ref_binds_and_transfers_uid() {
        let structure = element("video").attribute_slot("class", 0).into_structure();
        let engine = engine();

        let first = Ref::new();
        let root = engine
            .render(Partial::new(&structure, vec![first.clone().into()]), None)
            .node();

        assert_eq!(
            engine.with_host(|host| host.attribute(root, "class")),
            Some(first.uid()),
            "the uid is written as the identifier attribute"
        );
        assert_eq!(first.resolve(&engine), root);

        let second = Ref::new();
        engine.render(Partial::new(&structure, vec![second.clone().into()]), Some(root));

        assert_eq!(second.uid(), first.uid(), "the old uid transfers to the new ref");
        assert_eq!(first.resolve(&engine), root, "old handles stay valid");
        assert_eq!(second.resolve(&engine), root);
    }

    #[test]
    #[should_panic(expected = "is not bound to a rendered node")]
    fn test_unbound_ref_fails_fast() {
        let engine = engine();
        let dangling = Ref::new();
        dangling.resolve(&engine);
    }

    // =========================================================================
    // Reuse and mounting
    // =========================================================================

    #[test]
    fn test_reuse_mode_adopts_node_and_strips_attributes() {
        let first = element("div")
            .attribute("class", "old")
            .attribute("data-keep", "1")
            .slot(0)
            .into_structure();
        let second = element("div").attribute("data-keep", "2").slot(0).into_structure();
        let engine = engine();

        let root = engine
            .render(Partial::new(&first, vec!["a".into()]), None)
            .node();
        let adopted = engine
            .render(Partial::new(&second, vec!["b".into()]), Some(root))
            .node();

        assert_eq!(adopted, root, "matching tag must reuse the existing node");
        assert_eq!(
            engine.with_host(|host| host.attribute(root, "class")),
            None,
            "attributes absent from the new template are stripped"
        );
        assert_eq!(
            engine.with_host(|host| host.attribute(root, "data-keep")),
            Some("2".to_string())
        );
        assert_eq!(html(&engine, root), "<div data-keep=\"2\">b</div>");
    }

    #[test]
    fn test_fragment_root_clears_and_appends() {
        let view = fragment()
            .child(element("h1").slot(0))
            .child(element("p").text("body"))
            .into_structure();
        let engine = engine();

        let container = engine.with_host_mut(|host| {
            let main = host.create_element("main", None);
            let stale = host.create_text("stale");
            host.append_child(main, stale);
            main
        });

        let mounted = engine
            .render(Partial::new(&view, vec!["Title".into()]), Some(container))
            .node();
        assert_eq!(mounted, container, "fragment adopts the mount target");
        assert_eq!(html(&engine, container), "<main><h1>Title</h1><p>body</p></main>");

        let h1 = children(&engine, container)[0];
        engine.render(Partial::new(&view, vec!["Updated".into()]), Some(container));
        assert_eq!(html(&engine, container), "<main><h1>Updated</h1><p>body</p></main>");
        assert_eq!(children(&engine, container)[0], h1, "re-render patches in place");
    }

    #[test]
    fn test_unmount_tears_down_side_tables() {
        let structure = element("div").attribute_slot("class", 0).into_structure();
        let engine = engine();

        let container = engine.with_host_mut(|host| host.create_element("main", None));
        let handle = Ref::new();
        let root = engine
            .render(Partial::new(&structure, vec![handle.clone().into()]), None)
            .node();
        engine.with_host_mut(|host| host.append_child(container, root));
        assert!(engine.rendered_key(root).is_some());

        engine.unmount(root);
        assert_eq!(children(&engine, container), Vec::<NodeId>::new());
        assert_eq!(engine.rendered_key(root), None);
    }

    #[test]
    #[should_panic(expected = "is not bound to a rendered node")]
    fn test_unmount_unbinds_refs() {
        let structure = element("div").attribute_slot("class", 0).into_structure();
        let engine = engine();

        let handle = Ref::new();
        let root = engine
            .render(Partial::new(&structure, vec![handle.clone().into()]), None)
            .node();
        engine.unmount(root);
        handle.resolve(&engine);
    }
}
