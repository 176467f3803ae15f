#![forbid(unsafe_code)]

//! Core model for EELS quantification.
//!
//! - [`reactive`]: single-threaded events, RAII subscriptions and the echo
//!   guard used by bindings to suppress feedback loops.
//! - [`calibration`]: affine pixel to physical-unit transform.
//! - [`interval`]: energy intervals and their fractional form.
//! - [`shell`]: opaque electron-shell reference carried by an edge.
//! - [`edge`]: the observable [`EelsEdge`] entity and its persisted record.

pub mod calibration;
pub mod edge;
pub mod error;
pub mod interval;
pub mod reactive;
pub mod shell;

pub use calibration::Calibration;
pub use edge::{EdgeProperty, EdgeRecord, EelsEdge, FIT_EELS_INTERVALS, ListChange};
pub use error::{EelsError, Result};
pub use interval::{EelsInterval, FractionalInterval, IntervalConverter};
pub use reactive::{EchoGuard, EchoToken, Event, Subscription, SubscriptionScope};
pub use shell::ElectronShell;
