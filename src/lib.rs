//! # quilt
//!
//! Incremental template rendering and reconciliation engine.
//!
//! A caller describes a tree of output nodes with embedded dynamic value
//! slots, compiles that description once per template identity, and
//! cheaply re-applies new values to a previously produced output tree
//! without rebuilding it.
//!
//! ## Architecture
//!
//! ```text
//! Structure (static tree + slots)
//!   └─ compile (cached per identity) → Template
//!        └─ build against values → output subtree + sorted Editor list
//!             └─ re-render → editors patch in place
//!                  ├─ scalar slots: patch / replace / remove / defer
//!                  └─ list slots: keyed match, move, insert, remove
//! ```
//!
//! The output tree itself is externally owned and reached only through
//! the [`HostTree`] adapter; node creation returns opaque handles and the
//! engine keys all of its side tables by them. Async slot values resolve
//! through a single-threaded task pool owned by the engine; re-rendering
//! a subtree invalidates its in-flight continuations (latest render
//! wins).
//!
//! ## Modules
//!
//! - [`types`] - slot values and partials
//! - [`template`] - static structures, the compiler, template identity
//! - [`engine`] - the engine: stores, render, editors, reconcilers
//! - [`resolve`] - async value unwinding (futures and resumable
//!   computations)
//! - [`reference`] - stable node handles surviving re-renders
//! - [`host`] - the host tree adapter and the in-memory reference adapter
//! - [`config`] - attribute/tag lookup tables
//! - [`error`] - compile and async error types

pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod reference;
pub mod resolve;
pub mod template;
pub mod types;

// Re-export commonly used items
pub use config::EngineConfig;
pub use engine::{Engine, PendingRender, Rendered, RenderedContext};
pub use error::{AsyncError, CompileError};
pub use host::{HostTree, MemoryTree, NodeId};
pub use reference::Ref;
pub use resolve::{Resumable, ResumableValue, Step, ValueFuture};
pub use template::{element, fragment, Structure, TemplateId};
pub use types::{Partial, PartialKey, Value};
