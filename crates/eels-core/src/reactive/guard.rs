#![forbid(unsafe_code)]

//! Re-entrancy guard for bidirectional bindings.
//!
//! A binding that writes into the other side of a connection holds an
//! [`EchoToken`] for the duration of the write. Its own handlers check the
//! guard first and ignore the echo that the write produces.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// A shared on/off flag owned by one binding instance.
#[derive(Clone, Default)]
pub struct EchoGuard {
    active: Rc<Cell<bool>>,
}

impl EchoGuard {
    /// Create a released guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a propagation holding this guard is in flight.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Acquire the guard, or `None` if it is already held.
    #[must_use]
    pub fn try_acquire(&self) -> Option<EchoToken> {
        if self.active.replace(true) {
            None
        } else {
            Some(EchoToken {
                active: Rc::clone(&self.active),
            })
        }
    }
}

impl fmt::Debug for EchoGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EchoGuard")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Proof that an [`EchoGuard`] is held. Releases the guard on drop.
#[must_use = "the guard is released as soon as the token is dropped"]
pub struct EchoToken {
    active: Rc<Cell<bool>>,
}

impl Drop for EchoToken {
    fn drop(&mut self) {
        self.active.set(false);
    }
}

impl fmt::Debug for EchoToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EchoToken").finish()
    }
}
