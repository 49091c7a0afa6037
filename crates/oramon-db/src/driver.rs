//! Driver abstraction.
//!
//! The connection manager never talks to a database client library
//! directly. A [`Driver`] opens [`Session`]s, a session runs parameterized
//! queries and hands back a [`Cursor`] that fills typed scan targets. The
//! production implementation lives in `crate::odpi`; tests use the
//! scripted driver from `crate::testing`.

use std::fmt;

use async_trait::async_trait;

use crate::decode::{ColumnMeta, ScanTarget};
use crate::error::DriverError;

/// Resolved connection parameters for one session.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub connect_string: String,
    pub username: String,
    pub password: String,
    /// Tenant this session is scoped to; `None` for the root container.
    pub tenant: Option<String>,
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectTarget")
            .field("connect_string", &self.connect_string)
            .field("username", &self.username)
            .field("tenant", &self.tenant)
            .finish_non_exhaustive()
    }
}

/// Positional bind parameter (`:1`, `:2`, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Param::Text(s.to_string())
    }
}

impl From<String> for Param {
    fn from(s: String) -> Self {
        Param::Text(s)
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Float(v)
    }
}

/// Opens sessions. Injected so tests can script the database.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn Session>, DriverError>;
}

/// One physical connection.
#[async_trait]
pub trait Session: Send + Sync {
    /// Round-trip liveness check.
    async fn ping(&self) -> Result<(), DriverError>;

    /// Execute a query and return a cursor over its rows.
    async fn query(&self, sql: &str, params: &[Param]) -> Result<Box<dyn Cursor>, DriverError>;

    /// Abort whatever call is currently outstanding on this session.
    /// Must not block on that call.
    fn interrupt(&self);

    /// Release the connection. Calling it twice is harmless.
    async fn close(&self) -> Result<(), DriverError>;
}

/// Row source for one executed query.
pub trait Cursor: Send {
    fn columns(&self) -> &[ColumnMeta];

    /// Fill `targets` (one per column) with the next row.
    /// Returns `Ok(false)` once the rows are exhausted.
    fn scan(&mut self, targets: &mut [ScanTarget]) -> Result<bool, DriverError>;
}

/// Driver used when the crate is built without a database client.
#[derive(Debug, Default)]
pub struct UnavailableDriver;

#[async_trait]
impl Driver for UnavailableDriver {
    async fn connect(&self, _target: &ConnectTarget) -> Result<Box<dyn Session>, DriverError> {
        Err(DriverError::Unavailable(
            "oramon was built without oracle support (enable the `oracle` feature)".to_string(),
        ))
    }
}
