#![forbid(unsafe_code)]

//! Errors raised by quantification objects.

use eels_core::EelsError;

/// Errors from quantifications, displays, managers and configuration.
#[derive(Debug, thiserror::Error)]
pub enum QuantificationError {
    /// A core model precondition failed.
    #[error(transparent)]
    Model(#[from] EelsError),
    /// A persisted record property could not be decoded or encoded.
    #[error("malformed record: {0}")]
    Record(#[from] serde_json::Error),
    /// A configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    /// A configuration parsed but holds unusable values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The backing record was already removed from the document.
    #[error("record was already removed from the document")]
    Detached,
    /// A display record lacks one of its referenced objects.
    #[error("display record has no `{0}` reference")]
    MissingReference(&'static str),
}

/// Result alias for quantification operations.
pub type Result<T, E = QuantificationError> = std::result::Result<T, E>;
