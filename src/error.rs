//! Error types for template compilation and async value resolution.
//!
//! Two of the three error classes the engine distinguishes live here:
//! - [`CompileError`] - malformed static structures, detected once at
//!   compile time, cached, and re-raised on every subsequent lookup
//! - [`AsyncError`] - a rejected async value feeding a slot or a top-level
//!   render
//!
//! The third class, programmer-usage errors (value/slot count mismatch,
//! resolving an unbound [`Ref`](crate::reference::Ref), building malformed
//! values), fails fast with a panic and is deliberately not representable
//! as a value.

use thiserror::Error;

/// Failure while compiling a static structure into a template.
///
/// Compilation happens once per template identity. A failed compilation is
/// cached alongside successful ones, so re-rendering the same broken
/// structure re-raises the same error without re-validating.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A slot index appears in more than one position of the structure.
    ///
    /// Slot indices map one-to-one onto value positions; a duplicate would
    /// make editor ordering ambiguous.
    #[error("slot {index} is referenced more than once in the template")]
    DuplicateSlot { index: usize },

    /// Slot indices are not contiguous from zero.
    ///
    /// The template references a highest slot of `count - 1` but `index`
    /// never appears, so a value list of length `count` could not be applied.
    #[error("slot {index} is missing; template references {count} slots")]
    MissingSlot { index: usize, count: usize },

    /// A fragment structure with no children compiles to nothing.
    #[error("fragment template has no children")]
    EmptyFragment,
}

/// A rejected async value.
///
/// Produced by the caller's value futures. A rejection that reaches a
/// top-level render surfaces through the pending render handle; a rejection
/// that reaches an individual slot is logged at error level and leaves the
/// slot untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("async value rejected: {0}")]
pub struct AsyncError(pub String);

impl AsyncError {
    /// Create a rejection from any displayable reason.
    pub fn new(reason: impl std::fmt::Display) -> Self {
        Self(reason.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_display() {
        let err = CompileError::DuplicateSlot { index: 2 };
        assert_eq!(
            err.to_string(),
            "slot 2 is referenced more than once in the template"
        );

        let err = CompileError::MissingSlot { index: 1, count: 3 };
        assert_eq!(err.to_string(), "slot 1 is missing; template references 3 slots");
    }

    #[test]
    fn test_async_error_display() {
        let err = AsyncError::new("fetch failed");
        assert_eq!(err.to_string(), "async value rejected: fetch failed");
    }
}
