//! Error types for metric construction.

use thiserror::Error;

/// Result type alias for metric operations.
pub type MetricResult<T> = Result<T, MetricError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetricError {
    #[error("metric {name} expects {expected} label values, got {got}")]
    LabelCardinality {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("metric {0} already registered with a different shape")]
    Conflict(String),

    #[error("sample sink closed")]
    SinkClosed,
}
