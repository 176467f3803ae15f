#![forbid(unsafe_code)]

//! Lifetime grouping for subscriptions.
//!
//! # Invariants
//!
//! 1. Subscriptions are released in reverse registration order on `clear()`
//!    or drop.
//! 2. After release, no callback held by the scope fires.
//! 3. A cleared scope is reusable.

use std::fmt;

use super::event::{Event, Subscription};

/// Collects the subscriptions an object holds on its collaborators.
#[derive(Default)]
pub struct SubscriptionScope {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionScope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `subscription` alive until the scope is cleared or dropped.
    pub fn hold(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Subscribe to `event` within this scope.
    pub fn subscribe<A: 'static>(
        &mut self,
        event: &Event<A>,
        callback: impl Fn(&A) + 'static,
    ) -> &mut Self {
        self.subscriptions.push(event.subscribe(callback));
        self
    }

    /// Number of held subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the scope holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release every held subscription now.
    pub fn clear(&mut self) {
        while let Some(mut subscription) = self.subscriptions.pop() {
            subscription.close();
        }
    }
}

impl Drop for SubscriptionScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
