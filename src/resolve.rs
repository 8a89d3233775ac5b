//! Async value resolution.
//!
//! Slot values may arrive asynchronously, either as futures or as resumable
//! computations (the explicit stand-in for coroutine control flow: a
//! [`Resumable`] is stepped, may suspend on a future, and is resumed with
//! the awaited result). [`unwind`] recursively reduces any such value to a
//! terminal [`Value`], staying synchronous whenever it can.
//!
//! Stale-result protection does not live here: the reconciler registers a
//! token in the owning context's pending set before awaiting and checks it
//! again on resolution. Re-rendering clears the set, which is the engine's
//! whole cancellation mechanism.

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::{LocalBoxFuture, Shared};
use futures::FutureExt;
use tracing::debug;

use crate::error::AsyncError;
use crate::types::Value;

// =============================================================================
// ValueFuture
// =============================================================================

type SharedValue = Shared<LocalBoxFuture<'static, Result<Value, AsyncError>>>;

/// An async slot value.
///
/// Internally shared, so the same value instance can be applied on more
/// than one render pass (re-rendering an identical partial is idempotent,
/// including its futures).
#[derive(Clone)]
pub struct ValueFuture {
    inner: SharedValue,
}

impl ValueFuture {
    /// Wrap a future producing a value.
    pub fn new(future: impl std::future::Future<Output = Result<Value, AsyncError>> + 'static) -> Self {
        Self {
            inner: future.boxed_local().shared(),
        }
    }

    /// An already-resolved future.
    pub fn ready(value: Value) -> Self {
        Self::new(async move { Ok(value) })
    }

    /// An already-rejected future.
    pub fn rejected(error: AsyncError) -> Self {
        Self::new(async move { Err(error) })
    }

    /// Await the shared result.
    pub(crate) fn wait(&self) -> SharedValue {
        self.inner.clone()
    }
}

impl From<ValueFuture> for Value {
    fn from(future: ValueFuture) -> Self {
        Value::Future(future)
    }
}

// =============================================================================
// Resumable computations
// =============================================================================

/// One step of a resumable computation.
pub enum Step {
    /// The computation finished with a final value (which may itself need
    /// unwinding).
    Done(Value),
    /// The computation suspended on a future; it is resumed with the
    /// awaited (and recursively unwound) result.
    Suspended(ValueFuture),
}

/// A resumable computation: stepped with the previously awaited value,
/// yields either a final value or another suspension point.
pub trait Resumable {
    /// Advance the computation. `input` is `Value::Null` on the first step
    /// and the resolved suspension value afterwards.
    fn step(&mut self, input: Value) -> Step;
}

/// A [`Resumable`] boxed into a slot value.
///
/// Stepping consumes the computation; applying the same instance a second
/// time resolves to `Value::Null`.
#[derive(Clone)]
pub struct ResumableValue {
    inner: Rc<RefCell<Option<Box<dyn Resumable>>>>,
}

impl ResumableValue {
    /// Box a resumable computation.
    pub fn new(resumable: impl Resumable + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Some(Box::new(resumable)))),
        }
    }

    fn take(&self) -> Option<Box<dyn Resumable>> {
        self.inner.borrow_mut().take()
    }
}

impl From<ResumableValue> for Value {
    fn from(resumable: ResumableValue) -> Self {
        Value::Resumable(resumable)
    }
}

// =============================================================================
// Unwinding
// =============================================================================

/// The outcome of unwinding a value.
pub enum Resolved {
    /// The value was terminal (or reduced to one synchronously).
    Now(Value),
    /// The value suspends; the future yields the terminal value.
    Later(LocalBoxFuture<'static, Result<Value, AsyncError>>),
}

/// Recursively reduce a value to terminal content.
///
/// Resumable computations are stepped; a suspension awaits its future,
/// resumes the computation with the result, and repeats. Futures resolve
/// and their results unwind again. Everything else passes through
/// untouched.
pub fn unwind(value: Value) -> Resolved {
    match value {
        Value::Resumable(resumable) => {
            let Some(mut computation) = resumable.take() else {
                debug!("resumable value already consumed, resolving to null");
                return Resolved::Now(Value::Null);
            };
            match computation.step(Value::Null) {
                Step::Done(inner) => unwind(inner),
                Step::Suspended(future) => Resolved::Later(
                    async move {
                        let mut future = future;
                        loop {
                            let input = unwind_future(future).await?;
                            match computation.step(input) {
                                Step::Done(inner) => return unwind_async(inner).await,
                                Step::Suspended(next) => future = next,
                            }
                        }
                    }
                    .boxed_local(),
                ),
            }
        }
        Value::Future(future) => Resolved::Later(unwind_future(future)),
        terminal => Resolved::Now(terminal),
    }
}

/// Await a value future and keep unwinding its result.
fn unwind_future(future: ValueFuture) -> LocalBoxFuture<'static, Result<Value, AsyncError>> {
    async move {
        let value = future.wait().await?;
        unwind_async(value).await
    }
    .boxed_local()
}

/// Async form of [`unwind`], boxed so the recursion through futures of
/// futures stays finite-sized.
pub(crate) fn unwind_async(value: Value) -> LocalBoxFuture<'static, Result<Value, AsyncError>> {
    async move {
        match unwind(value) {
            Resolved::Now(terminal) => Ok(terminal),
            Resolved::Later(future) => future.await,
        }
    }
    .boxed_local()
}

// =============================================================================
// Tests
// =============================================================================
