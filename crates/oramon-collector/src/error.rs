//! Error types for the scrape orchestrator and its collection tasks.

use oramon_db::{ConfigError, DbError, DecodeError};
use oramon_ledger::LedgerError;
use oramon_metrics::MetricError;
use thiserror::Error;

/// Result type alias for collection operations.
pub type CollectResult<T> = Result<T, CollectError>;

/// The instance reported a version string we cannot read.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("can not parse oracle version {0:?}")]
pub struct VersionParseError(pub String);

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Version(#[from] VersionParseError),

    #[error("query returned no rows: {0}")]
    NoRows(&'static str),

    #[error("collector {collector} aborted: {message}")]
    Task {
        collector: &'static str,
        message: String,
    },
}
