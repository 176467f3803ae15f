#![forbid(unsafe_code)]

//! Change-notification primitives for the quantification model.
//!
//! - [`Event`]: an ordered list of subscriber callbacks for one kind of
//!   notification (property changed, item inserted, about to be removed...).
//! - [`Subscription`]: RAII handle that unsubscribes on drop or `close()`.
//! - [`SubscriptionScope`]: collects subscriptions owned by one object so
//!   they can be released together.
//! - [`EchoGuard`]: per-binding re-entrancy flag with a scoped token.
//!
//! # Architecture
//!
//! Everything is single-threaded and synchronous. `Event<A>` uses
//! `Rc<RefCell<..>>` for shared ownership. Subscribers are stored as `Weak`
//! callbacks; the strong reference lives in the `Subscription`, so dropping
//! the subscription is all it takes to detach. Dead entries are pruned
//! lazily during notification.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. A subscription released before a notification is never called by it,
//!    even when the release happens from inside an earlier callback of the
//!    same dispatch.
//! 3. Callbacks may subscribe, unsubscribe or re-enter `notify` freely; no
//!    borrow of the subscriber list is held while a callback runs.
//! 4. Closing a subscription twice is a no-op.
//! 5. An [`EchoToken`] resets its guard on drop, including during unwinding.

pub mod event;
pub mod guard;
pub mod scope;

pub use event::{Event, Subscription};
pub use guard::{EchoGuard, EchoToken};
pub use scope::SubscriptionScope;
