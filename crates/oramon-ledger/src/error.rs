//! Error types for the snapshot ledger.

use thiserror::Error;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur while persisting the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to create ledger directory: {0}")]
    CreateDir(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("rename error: {0}")]
    Rename(String),
}
