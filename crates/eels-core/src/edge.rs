#![forbid(unsafe_code)]

//! The observable EELS edge.
//!
//! An [`EelsEdge`] is one signal interval, an ordered list of fit intervals
//! and an optional electron shell. Its identity is a UUID that survives
//! persistence.
//!
//! Every mutator changes state, releases its borrow, then emits exactly one
//! notification before returning. Listeners may therefore read the edge
//! (and even mutate it) from inside a callback. The four events are the only
//! change channel: consumers never poll.
//!
//! # Invariants
//!
//! 1. `uuid` never changes after construction.
//! 2. Each mutator emits exactly one notification, after the state change.
//! 3. List notifications carry the index the change happened at and the
//!    item inserted, removed or stored.

use std::cell::RefCell;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EelsError, Result};
use crate::interval::EelsInterval;
use crate::reactive::{Event, Subscription};
use crate::shell::ElectronShell;

/// List key carried by fit-interval notifications.
pub const FIT_EELS_INTERVALS: &str = "fit_eels_intervals";

/// Scalar edge properties that emit property-changed notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeProperty {
    SignalEelsInterval,
    ElectronShell,
}

impl EdgeProperty {
    /// Persisted property name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SignalEelsInterval => "signal_eels_interval",
            Self::ElectronShell => "electron_shell",
        }
    }
}

impl fmt::Display for EdgeProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An insert, remove or value-change at one index of a named list.
#[derive(Clone, Debug, PartialEq)]
pub struct ListChange<T> {
    pub key: &'static str,
    pub item: T,
    pub index: usize,
}

// ---------------------------------------------------------------------------
// Persisted shape
// ---------------------------------------------------------------------------

/// Persisted form of an edge inside a quantification record.
///
/// A missing `uuid` is replaced by a fresh one when the edge is built.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_eels_interval: Option<EelsInterval>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fit_eels_intervals: Vec<EelsInterval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub electron_shell: Option<ElectronShell>,
}

// ---------------------------------------------------------------------------
// EelsEdge
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
struct EdgeState {
    signal_eels_interval: Option<EelsInterval>,
    fit_eels_intervals: Vec<EelsInterval>,
    electron_shell: Option<ElectronShell>,
}

/// A signal interval, its fit intervals and shell metadata.
pub struct EelsEdge {
    uuid: Uuid,
    state: RefCell<EdgeState>,
    property_changed: Event<EdgeProperty>,
    item_inserted: Event<ListChange<EelsInterval>>,
    item_removed: Event<ListChange<EelsInterval>>,
    item_value_changed: Event<ListChange<EelsInterval>>,
}

impl EelsEdge {
    /// Create an edge with a fresh identity.
    #[must_use]
    pub fn new(
        signal_eels_interval: Option<EelsInterval>,
        fit_eels_intervals: Vec<EelsInterval>,
    ) -> Self {
        Self::with_uuid(Uuid::new_v4(), signal_eels_interval, fit_eels_intervals, None)
    }

    fn with_uuid(
        uuid: Uuid,
        signal_eels_interval: Option<EelsInterval>,
        fit_eels_intervals: Vec<EelsInterval>,
        electron_shell: Option<ElectronShell>,
    ) -> Self {
        Self {
            uuid,
            state: RefCell::new(EdgeState {
                signal_eels_interval,
                fit_eels_intervals,
                electron_shell,
            }),
            property_changed: Event::new(),
            item_inserted: Event::new(),
            item_removed: Event::new(),
            item_value_changed: Event::new(),
        }
    }

    /// Attach a shell at construction time (no notification).
    #[must_use]
    pub fn with_electron_shell(self, electron_shell: ElectronShell) -> Self {
        self.state.borrow_mut().electron_shell = Some(electron_shell);
        self
    }

    /// Rebuild an edge from its persisted record.
    #[must_use]
    pub fn from_record(record: EdgeRecord) -> Self {
        Self::with_uuid(
            record.uuid.unwrap_or_else(Uuid::new_v4),
            record.signal_eels_interval,
            record.fit_eels_intervals,
            record.electron_shell,
        )
    }

    /// Decode an edge from a JSON record value.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(Self::from_record(serde_json::from_value(value)?))
    }

    /// Snapshot the persisted form.
    #[must_use]
    pub fn to_record(&self) -> EdgeRecord {
        let state = self.state.borrow();
        EdgeRecord {
            uuid: Some(self.uuid),
            signal_eels_interval: state.signal_eels_interval,
            fit_eels_intervals: state.fit_eels_intervals.clone(),
            electron_shell: state.electron_shell,
        }
    }

    /// Encode the persisted form as JSON.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.to_record())?)
    }

    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    #[must_use]
    pub fn signal_eels_interval(&self) -> Option<EelsInterval> {
        self.state.borrow().signal_eels_interval
    }

    pub fn set_signal_eels_interval(&self, interval: Option<EelsInterval>) {
        self.state.borrow_mut().signal_eels_interval = interval;
        tracing::trace!(edge = %self.uuid, ?interval, "signal interval changed");
        self.property_changed
            .notify(&EdgeProperty::SignalEelsInterval);
    }

    #[must_use]
    pub fn electron_shell(&self) -> Option<ElectronShell> {
        self.state.borrow().electron_shell
    }

    pub fn set_electron_shell(&self, electron_shell: Option<ElectronShell>) {
        self.state.borrow_mut().electron_shell = electron_shell;
        self.property_changed.notify(&EdgeProperty::ElectronShell);
    }

    /// Snapshot of the fit intervals.
    #[must_use]
    pub fn fit_eels_intervals(&self) -> Vec<EelsInterval> {
        self.state.borrow().fit_eels_intervals.clone()
    }

    #[must_use]
    pub fn fit_eels_interval(&self, index: usize) -> Option<EelsInterval> {
        self.state.borrow().fit_eels_intervals.get(index).copied()
    }

    #[must_use]
    pub fn fit_eels_interval_count(&self) -> usize {
        self.state.borrow().fit_eels_intervals.len()
    }

    /// Insert a fit interval before `index` (`index == len` appends).
    pub fn insert_fit_eels_interval(&self, index: usize, interval: EelsInterval) -> Result<()> {
        {
            let mut state = self.state.borrow_mut();
            let len = state.fit_eels_intervals.len();
            if index > len {
                return Err(EelsError::IndexOutOfRange { index, len });
            }
            state.fit_eels_intervals.insert(index, interval);
        }
        self.fit_interval_inserted(index, interval);
        Ok(())
    }

    pub fn append_fit_eels_interval(&self, interval: EelsInterval) {
        let index = {
            let mut state = self.state.borrow_mut();
            state.fit_eels_intervals.push(interval);
            state.fit_eels_intervals.len() - 1
        };
        self.fit_interval_inserted(index, interval);
    }

    fn fit_interval_inserted(&self, index: usize, interval: EelsInterval) {
        tracing::trace!(edge = %self.uuid, index, "fit interval inserted");
        self.item_inserted.notify(&ListChange {
            key: FIT_EELS_INTERVALS,
            item: interval,
            index,
        });
    }

    /// Remove and return the fit interval at `index`.
    pub fn remove_fit_eels_interval(&self, index: usize) -> Result<EelsInterval> {
        let removed = {
            let mut state = self.state.borrow_mut();
            let len = state.fit_eels_intervals.len();
            if index >= len {
                return Err(EelsError::IndexOutOfRange { index, len });
            }
            state.fit_eels_intervals.remove(index)
        };
        tracing::trace!(edge = %self.uuid, index, "fit interval removed");
        self.item_removed.notify(&ListChange {
            key: FIT_EELS_INTERVALS,
            item: removed,
            index,
        });
        Ok(removed)
    }

    /// Replace the fit interval at `index`.
    pub fn set_fit_eels_interval(&self, index: usize, interval: EelsInterval) -> Result<()> {
        {
            let mut state = self.state.borrow_mut();
            let len = state.fit_eels_intervals.len();
            let slot = state
                .fit_eels_intervals
                .get_mut(index)
                .ok_or(EelsError::IndexOutOfRange { index, len })?;
            *slot = interval;
        }
        tracing::trace!(edge = %self.uuid, index, "fit interval changed");
        self.item_value_changed.notify(&ListChange {
            key: FIT_EELS_INTERVALS,
            item: interval,
            index,
        });
        Ok(())
    }

    pub fn on_property_changed(&self, callback: impl Fn(&EdgeProperty) + 'static) -> Subscription {
        self.property_changed.subscribe(callback)
    }

    pub fn on_item_inserted(
        &self,
        callback: impl Fn(&ListChange<EelsInterval>) + 'static,
    ) -> Subscription {
        self.item_inserted.subscribe(callback)
    }

    pub fn on_item_removed(
        &self,
        callback: impl Fn(&ListChange<EelsInterval>) + 'static,
    ) -> Subscription {
        self.item_removed.subscribe(callback)
    }

    pub fn on_item_value_changed(
        &self,
        callback: impl Fn(&ListChange<EelsInterval>) + 'static,
    ) -> Subscription {
        self.item_value_changed.subscribe(callback)
    }
}

impl PartialEq for EelsEdge {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for EelsEdge {}

impl fmt::Debug for EelsEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EelsEdge")
            .field("uuid", &self.uuid)
            .field("signal_eels_interval", &state.signal_eels_interval)
            .field("fit_eels_intervals", &state.fit_eels_intervals)
            .field("electron_shell", &state.electron_shell)
            .finish()
    }
}
