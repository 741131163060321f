//! Error types for screen span tracking
//!
//! None of these ever reach the host application through a navigation
//! handler: handlers log them and reset the affected tracker instead.

use thiserror::Error;

use crate::telemetry::span::SpanId;

/// Errors raised by the span capability, configuration parsing and registration
#[derive(Error, Debug)]
pub enum PulseError {
    /// The span backend refused or failed an operation
    #[error("Span backend error: {0}")]
    Backend(String),

    /// The backend has no record of this span
    #[error("Unknown span: {0}")]
    UnknownSpan(SpanId),

    /// The span was already ended or discarded
    #[error("Span {0} is already finished")]
    SpanFinished(SpanId),

    /// A container ref was registered while its slot was empty
    #[error("Invalid navigation container ref: {0}")]
    InvalidContainerRef(String),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PulseError>;
