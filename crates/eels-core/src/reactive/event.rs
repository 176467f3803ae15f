#![forbid(unsafe_code)]

//! Typed notification channel with RAII subscriptions.
//!
//! # Usage
//!
//! ```
//! use eels_core::reactive::Event;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let changed: Event<&'static str> = Event::new();
//! let seen = Rc::new(Cell::new(0));
//!
//! let s = Rc::clone(&seen);
//! let sub = changed.subscribe(move |_| s.set(s.get() + 1));
//!
//! changed.notify(&"interval");
//! assert_eq!(seen.get(), 1);
//!
//! drop(sub);
//! changed.notify(&"interval");
//! assert_eq!(seen.get(), 1);
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<A> = dyn Fn(&A);

// ---------------------------------------------------------------------------
// Event<A>
// ---------------------------------------------------------------------------

/// An ordered list of callbacks invoked with a borrowed argument.
///
/// Cloning an `Event` yields another handle to the same subscriber list.
pub struct Event<A: 'static> {
    subscribers: Rc<RefCell<Vec<Weak<Callback<A>>>>>,
}

impl<A: 'static> Event<A> {
    /// Create an event with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Register `callback`. It stays registered until the returned
    /// [`Subscription`] is dropped or closed.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&A) + 'static) -> Subscription {
        let callback: Rc<Callback<A>> = Rc::new(callback);
        {
            let mut subscribers = self.subscribers.borrow_mut();
            subscribers.retain(|weak| weak.strong_count() > 0);
            subscribers.push(Rc::downgrade(&callback));
        }
        Subscription::holding(callback)
    }

    /// Invoke every live subscriber in registration order.
    pub fn notify(&self, arg: &A) {
        let snapshot: Vec<Weak<Callback<A>>> = {
            let mut subscribers = self.subscribers.borrow_mut();
            subscribers.retain(|weak| weak.strong_count() > 0);
            subscribers.clone()
        };
        for weak in snapshot {
            // Upgrade late so a subscriber released by an earlier callback
            // in this same dispatch is skipped.
            if let Some(callback) = weak.upgrade() {
                callback(arg);
            }
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

impl<A: 'static> Default for Event<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> Clone for Event<A> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Rc::clone(&self.subscribers),
        }
    }
}

impl<A: 'static> fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Keeps one callback registered with an [`Event`].
///
/// The subscription owns the only strong reference to the callback, so the
/// event stops calling it as soon as the subscription is dropped or closed.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    callback: Option<Box<dyn Any>>,
}

impl Subscription {
    fn holding<A: 'static>(callback: Rc<Callback<A>>) -> Self {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// A subscription that is already closed. Useful as a placeholder.
    pub fn closed() -> Self {
        Self { callback: None }
    }

    /// Detach the callback. Calling this more than once is harmless.
    pub fn close(&mut self) {
        self.callback = None;
    }

    /// Whether the callback is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.callback.is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
