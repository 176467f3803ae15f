#![forbid(unsafe_code)]

//! Errors raised by the core model.
//!
//! Every variant except [`EelsError::Record`] is a precondition violation:
//! the caller asked for something the model cannot represent. They are
//! returned rather than retried.

use uuid::Uuid;

/// Errors from core model operations.
#[derive(Debug, thiserror::Error)]
pub enum EelsError {
    /// Conversions need at least one sample.
    #[error("data length must be greater than zero")]
    EmptyData,
    /// A zero calibration scale cannot be inverted.
    #[error("calibration scale must be non-zero")]
    DegenerateCalibration,
    /// A full conversion was requested on an interval with an absent bound.
    #[error("interval has no {0} bound")]
    MissingBound(&'static str),
    /// A list index did not address an existing element.
    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    /// Edge identities must be unique within a quantification.
    #[error("edge {0} is already part of the quantification")]
    DuplicateEdge(Uuid),
    /// The edge is not owned by the quantification being addressed.
    #[error("edge {0} is not part of the quantification")]
    UnknownEdge(Uuid),
    /// Only interval-valued edge properties can be bound to a graphic.
    #[error("edge property `{0}` is not an interval")]
    NotAnIntervalProperty(&'static str),
    /// The edge has no signal interval to derive a graphic from.
    #[error("edge has no signal interval")]
    MissingSignalInterval,
    /// A persisted record could not be decoded or encoded.
    #[error("malformed record: {0}")]
    Record(#[from] serde_json::Error),
}

/// Result alias for core model operations.
pub type Result<T, E = EelsError> = std::result::Result<T, E>;
