//! Error types for the oramon database layer.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for connection manager operations.
pub type DbResult<T> = Result<T, DbError>;

/// The target configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors reported by a [`Driver`](crate::Driver) implementation.
///
/// Drivers flatten their native errors into strings; the manager decides
/// which [`DbError`] class they belong to.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DriverError {
    #[error("{0}")]
    Connect(String),

    #[error("{0}")]
    Query(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("scan failed at column {column}: {message}")]
    Scan { column: usize, message: String },

    #[error("connection is closed")]
    Closed,

    #[error("{0}")]
    Unavailable(String),
}

/// A row batch could not be decoded, or a decoded value was accessed as
/// the wrong kind.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    #[error("scan failed at column {column}: {message}")]
    Scan { column: usize, message: String },

    #[error("driver error while fetching rows: {0}")]
    Fetch(String),

    #[error("column {index} holds {found}, expected {expected}")]
    Column {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("column {index} out of range for row of {len} values")]
    OutOfRange { index: usize, len: usize },
}

impl From<DriverError> for DecodeError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::Scan { column, message } => DecodeError::Scan { column, message },
            other => DecodeError::Fetch(other.to_string()),
        }
    }
}

/// Errors surfaced by the connection manager.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("connect to {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: DriverError,
    },

    #[error("close of {target} failed: {source}")]
    Close {
        target: String,
        #[source]
        source: DriverError,
    },

    #[error("query failed: {source}")]
    Query {
        sql: String,
        #[source]
        source: DriverError,
    },

    #[error("query timed out after {timeout:?}")]
    Timeout { sql: String, timeout: Duration },

    #[error("query cancelled")]
    Cancelled { sql: String },

    #[error("decode failed: {source}")]
    Decode {
        sql: String,
        #[source]
        source: DecodeError,
    },

    #[error("no open database connection")]
    NotConnected,
}

impl DbError {
    /// The query text this error relates to, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            DbError::Query { sql, .. }
            | DbError::Timeout { sql, .. }
            | DbError::Cancelled { sql }
            | DbError::Decode { sql, .. } => Some(sql),
            _ => None,
        }
    }

    /// Whether this error belongs to the query class (query, timeout,
    /// cancellation or decode failure) rather than configuration or
    /// connection establishment.
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            DbError::Query { .. }
                | DbError::Timeout { .. }
                | DbError::Cancelled { .. }
                | DbError::Decode { .. }
                | DbError::NotConnected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_driver_error_becomes_scan_decode_error() {
        let e = DecodeError::from(DriverError::Scan {
            column: 3,
            message: "type mismatch".into(),
        });
        assert_eq!(
            e,
            DecodeError::Scan {
                column: 3,
                message: "type mismatch".into()
            }
        );
    }

    #[test]
    fn other_driver_errors_become_fetch_errors() {
        let e = DecodeError::from(DriverError::Closed);
        assert_eq!(e, DecodeError::Fetch("connection is closed".into()));
    }

    #[test]
    fn query_errors_carry_sql() {
        let e = DbError::Timeout {
            sql: "select 1 from dual".into(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(e.sql(), Some("select 1 from dual"));
        assert!(e.is_query_error());

        let e = DbError::Config(ConfigError::Invalid("x".into()));
        assert_eq!(e.sql(), None);
        assert!(!e.is_query_error());
    }

    #[test]
    fn driver_message_is_visible_in_display() {
        let e = DbError::Query {
            sql: "select * from dba_free_space_nonrecyclebin".into(),
            source: DriverError::Query("ORA-00942: table or view does not exist".into()),
        };
        assert!(e.to_string().contains("ORA-00942"));
    }
}
