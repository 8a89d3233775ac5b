//! Stable node handles.
//!
//! A [`Ref`] is a handle, not an owner: it carries a uid, and the engine
//! registers uid → node when the ref is applied as an attribute value (the
//! uid is written as the attribute, giving the output a stable identifier).
//! On re-render, the attribute editor transfers the previous ref's uid onto
//! the newly constructed instance, so handles held outside the render cycle
//! keep resolving to the live node.
//!
//! Resolution goes through the engine explicitly
//! ([`Engine::resolve_ref`](crate::engine::Engine::resolve_ref) or the
//! delegating methods here); there is no property interception. Resolving a
//! ref that no render has bound yet is a caller bug and fails fast.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::Engine;
use crate::host::{HostTree, NodeId};
use crate::types::Value;

static NEXT_UID: AtomicU64 = AtomicU64::new(0);

/// A stable indirect handle to an output node.
///
/// # Example
///
/// ```ignore
/// use quilt::reference::Ref;
///
/// let video = Ref::new();
/// // <video class="${video}"> ... rendered through the engine ...
/// let node = video.resolve(&engine);
/// ```
#[derive(Debug, Clone)]
pub struct Ref {
    uid: Rc<RefCell<String>>,
}

impl Ref {
    /// A ref with a fresh generated uid.
    pub fn new() -> Self {
        let n = NEXT_UID.fetch_add(1, Ordering::Relaxed);
        Self::with_uid(&format!("ref-{n}"))
    }

    /// A ref with an explicit uid.
    pub fn with_uid(uid: &str) -> Self {
        Self {
            uid: Rc::new(RefCell::new(uid.to_string())),
        }
    }

    /// The current uid.
    pub fn uid(&self) -> String {
        self.uid.borrow().clone()
    }

    /// Take over another ref's uid, keeping external handles to the old
    /// uid valid across a re-render.
    pub(crate) fn adopt_uid(&self, previous: &Ref) {
        if !Rc::ptr_eq(&self.uid, &previous.uid) {
            *self.uid.borrow_mut() = previous.uid();
        }
    }

    /// The node currently registered under this ref's uid.
    ///
    /// # Panics
    ///
    /// Panics if no render has bound the uid yet (or the bound node has
    /// been removed from the output tree).
    pub fn resolve<H: HostTree + 'static>(&self, engine: &Engine<H>) -> NodeId {
        engine.resolve_ref(self)
    }

    /// Read an attribute of the resolved node.
    pub fn attribute<H: HostTree + 'static>(&self, engine: &Engine<H>, name: &str) -> Option<String> {
        engine.ref_attribute(self, name)
    }

    /// Write an attribute of the resolved node.
    pub fn set_attribute<H: HostTree + 'static>(&self, engine: &Engine<H>, name: &str, value: &Value) {
        engine.set_ref_attribute(self, name, value);
    }
}

impl Default for Ref {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uids_are_unique() {
        let a = Ref::new();
        let b = Ref::new();
        assert_ne!(a.uid(), b.uid());
    }

    #[test]
    fn test_adopt_uid_transfers_identity() {
        let old = Ref::with_uid("stable");
        let new = Ref::new();
        new.adopt_uid(&old);
        assert_eq!(new.uid(), "stable");

        // Adopting from a clone of self is a no-op.
        let twin = new.clone();
        new.adopt_uid(&twin);
        assert_eq!(new.uid(), "stable");
    }
}
