//! oramon-db: database access for the oramon exporter.
//!
//! Owns the one connection the exporter keeps to the monitored database
//! and turns schema-less result sets into positional rows of uniform
//! values.
//!
//! # Architecture
//!
//! ```text
//! DbClient (connection manager)
//!   ├── TargetConfig ← [database] table, re-read on every init()
//!   ├── Driver ──connect──▶ Session ──query──▶ Cursor
//!   ├── one-permit slot ← serializes every query
//!   └── fetch_rows() ──▶ RowDecoder ──▶ Vec<Row>
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod decode;
pub mod driver;
pub mod error;
#[cfg(feature = "oracle")]
pub mod odpi;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

use std::sync::Arc;

pub use client::{DbClient, MAX_CONNECTIONS, ResultSet};
pub use config::TargetConfig;
pub use context::QueryContext;
pub use decode::{ColumnMeta, ColumnType, NULL_NUMBER, Row, RowDecoder, ScanTarget, Value, format_id};
pub use driver::{ConnectTarget, Cursor, Driver, Param, Session, UnavailableDriver};
pub use error::{ConfigError, DbError, DbResult, DecodeError, DriverError};

/// The driver this build talks to databases with.
pub fn default_driver() -> Arc<dyn Driver> {
    #[cfg(feature = "oracle")]
    {
        Arc::new(odpi::OracleDriver)
    }
    #[cfg(not(feature = "oracle"))]
    {
        Arc::new(UnavailableDriver)
    }
}
