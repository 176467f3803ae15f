#![forbid(unsafe_code)]

//! Two-way binding between one edge interval and one interval graphic.
//!
//! ```text
//!   EelsEdge.signal_eels_interval  ──convert──▶  graphic.interval
//!   EelsEdge.signal_eels_interval  ◀──convert_back──  graphic.interval
//! ```
//!
//! Each direction runs while holding the binding's [`EchoGuard`]. The change
//! it causes on the other side comes back as a notification, finds the guard
//! held and is dropped, so one external change produces exactly one write on
//! each side.

use std::fmt;
use std::rc::Rc;

use eels_core::{
    EchoGuard, EdgeProperty, EelsEdge, EelsError, IntervalConverter, SubscriptionScope,
};
use eels_host::{INTERVAL_PROPERTY, IntervalGraphic};

use crate::error::Result;

/// Keeps an edge's signal interval and a graphic's interval equal.
pub struct IntervalBinding {
    guard: EchoGuard,
    subscriptions: SubscriptionScope,
}

impl IntervalBinding {
    /// Bind `property` of `edge` to `graphic`, pushing the edge's current
    /// value into the graphic first.
    pub fn new(
        converter: IntervalConverter,
        edge: &Rc<EelsEdge>,
        property: EdgeProperty,
        graphic: Rc<dyn IntervalGraphic>,
    ) -> Result<Self> {
        if property != EdgeProperty::SignalEelsInterval {
            return Err(EelsError::NotAnIntervalProperty(property.as_str()).into());
        }
        let guard = EchoGuard::new();
        let converter = Rc::new(converter);

        if let Some(_token) = guard.try_acquire() {
            push_to_graphic(&converter, edge, graphic.as_ref());
        }

        let mut subscriptions = SubscriptionScope::new();
        {
            let guard = guard.clone();
            let converter = Rc::clone(&converter);
            let edge_ref = Rc::clone(edge);
            let graphic = Rc::clone(&graphic);
            subscriptions.hold(edge.on_property_changed(move |changed| {
                if *changed != property {
                    return;
                }
                let Some(_token) = guard.try_acquire() else {
                    return;
                };
                push_to_graphic(&converter, &edge_ref, graphic.as_ref());
            }));
        }
        {
            let guard = guard.clone();
            let edge = Rc::clone(edge);
            let source = Rc::clone(&graphic);
            subscriptions.hold(graphic.on_property_changed(Box::new(move |name: &str| {
                if name != INTERVAL_PROPERTY {
                    return;
                }
                let Some(_token) = guard.try_acquire() else {
                    return;
                };
                let interval = converter.convert_back(source.interval());
                tracing::trace!(edge = %edge.uuid(), ?interval, "graphic -> signal interval");
                edge.set_signal_eels_interval(Some(interval));
            })));
        }

        Ok(Self {
            guard,
            subscriptions,
        })
    }

    /// Whether a propagation started by this binding is in flight.
    #[must_use]
    pub fn is_propagating(&self) -> bool {
        self.guard.is_active()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Detach from both sides. Later calls are no-ops.
    pub fn close(&mut self) {
        self.subscriptions.clear();
    }
}

fn push_to_graphic(converter: &IntervalConverter, edge: &EelsEdge, graphic: &dyn IntervalGraphic) {
    let Some(interval) = edge.signal_eels_interval() else {
        tracing::trace!(edge = %edge.uuid(), "no signal interval to push");
        return;
    };
    match converter.convert(&interval) {
        Ok(fractional) => {
            tracing::trace!(edge = %edge.uuid(), ?fractional, "signal interval -> graphic");
            graphic.set_interval(fractional);
        }
        Err(err) => {
            tracing::error!(edge = %edge.uuid(), %err, "signal interval cannot be shown");
        }
    }
}

impl fmt::Debug for IntervalBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalBinding")
            .field("guard", &self.guard)
            .field("closed", &self.is_closed())
            .finish()
    }
}
