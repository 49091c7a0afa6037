//! Production driver backed by the `oracle` crate (ODPI-C).
//!
//! The client library is blocking, so every call runs on the blocking
//! pool. Result sets are read to the end inside the blocking call and
//! handed back as an in-memory cursor; interruption goes through
//! `break_execution`, which is safe to call from another thread while a
//! statement is running.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use ::oracle::sql_type::{OracleType, ToSql};
use ::oracle::Connection;
use tracing::warn;

use crate::decode::{ColumnMeta, ColumnType, ScanTarget};
use crate::driver::{ConnectTarget, Cursor, Driver, Param, Session};
use crate::error::DriverError;

/// Driver opening real Oracle sessions.
#[derive(Debug, Default)]
pub struct OracleDriver;

#[async_trait]
impl Driver for OracleDriver {
    async fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn Session>, DriverError> {
        let target = target.clone();
        let conn = blocking(move || {
            Connection::connect(&target.username, &target.password, &target.connect_string)
                .map_err(|e| DriverError::Connect(e.to_string()))
        })
        .await?;
        Ok(Box::new(OracleSession {
            conn: Arc::new(conn),
        }))
    }
}

struct OracleSession {
    conn: Arc<Connection>,
}

#[async_trait]
impl Session for OracleSession {
    async fn ping(&self) -> Result<(), DriverError> {
        let conn = Arc::clone(&self.conn);
        blocking(move || conn.ping().map_err(|e| DriverError::Connect(e.to_string()))).await
    }

    async fn query(&self, sql: &str, params: &[Param]) -> Result<Box<dyn Cursor>, DriverError> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let params = params.to_vec();
        let cursor = blocking(move || read_all(&conn, &sql, &params)).await?;
        Ok(Box::new(cursor))
    }

    fn interrupt(&self) {
        if let Err(e) = self.conn.break_execution() {
            warn!(error = %e, "break_execution failed");
        }
    }

    async fn close(&self) -> Result<(), DriverError> {
        let conn = Arc::clone(&self.conn);
        blocking(move || conn.close().map_err(|e| DriverError::Connect(e.to_string()))).await
    }
}

async fn blocking<T, F>(f: F) -> Result<T, DriverError>
where
    F: FnOnce() -> Result<T, DriverError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DriverError::Query(format!("blocking task failed: {e}")))?
}

fn read_all(conn: &Connection, sql: &str, params: &[Param]) -> Result<BufferedCursor, DriverError> {
    let owned: Vec<Box<dyn ToSql>> = params
        .iter()
        .map(|p| -> Box<dyn ToSql> {
            match p {
                Param::Text(s) => Box::new(s.clone()),
                Param::Int(v) => Box::new(*v),
                Param::Float(v) => Box::new(*v),
            }
        })
        .collect();
    let binds: Vec<&dyn ToSql> = owned.iter().map(|b| b.as_ref()).collect();

    let result = conn
        .query(sql, &binds)
        .map_err(|e| DriverError::Query(e.to_string()))?;

    let columns: Vec<ColumnMeta> = result
        .column_info()
        .iter()
        .map(|info| ColumnMeta::new(info.name(), type_tag(info.oracle_type())))
        .collect();
    let kinds: Vec<ColumnType> = columns.iter().map(ColumnMeta::column_type).collect();

    let mut rows = Vec::new();
    for row in result {
        let row = row.map_err(|e| DriverError::Fetch(e.to_string()))?;
        let mut cells = Vec::with_capacity(kinds.len());
        for (column, kind) in kinds.iter().enumerate() {
            cells.push(read_cell(&row, column, *kind)?);
        }
        rows.push(cells);
    }

    Ok(BufferedCursor {
        columns,
        rows: rows.into_iter(),
    })
}

fn read_cell(row: &::oracle::Row, column: usize, kind: ColumnType) -> Result<ScanTarget, DriverError> {
    let scan_err = |e: ::oracle::Error| DriverError::Scan {
        column,
        message: e.to_string(),
    };
    Ok(match kind {
        ColumnType::Text => ScanTarget::Text(row.get::<usize, Option<String>>(column).map_err(scan_err)?),
        ColumnType::Number => ScanTarget::Number(row.get::<usize, Option<f64>>(column).map_err(scan_err)?),
        ColumnType::Binary => {
            ScanTarget::Binary(row.get::<usize, Option<Vec<u8>>>(column).map_err(scan_err)?)
        }
        ColumnType::Timestamp => ScanTarget::Timestamp(
            row.get::<usize, Option<NaiveDateTime>>(column)
                .map_err(scan_err)?,
        ),
        ColumnType::Opaque => ScanTarget::Opaque(row.get::<usize, Option<String>>(column).map_err(scan_err)?),
    })
}

/// Driver-side type name used by [`ColumnType::for_tag`].
fn type_tag(ty: &OracleType) -> String {
    match ty {
        OracleType::Varchar2(_) => "VARCHAR2".to_string(),
        OracleType::NVarchar2(_) => "NVARCHAR2".to_string(),
        OracleType::Char(_) => "CHAR".to_string(),
        OracleType::NChar(_) => "NCHAR".to_string(),
        OracleType::Rowid => "ROWID".to_string(),
        OracleType::Raw(_) => "RAW".to_string(),
        OracleType::LongRaw => "LONG RAW".to_string(),
        OracleType::BinaryFloat => "BINARY_FLOAT".to_string(),
        OracleType::BinaryDouble => "BINARY_DOUBLE".to_string(),
        OracleType::Number(_, _) | OracleType::Int64 => "NUMBER".to_string(),
        OracleType::Float(_) => "FLOAT".to_string(),
        OracleType::Date => "DATE".to_string(),
        OracleType::Timestamp(_) => "TIMESTAMP".to_string(),
        OracleType::TimestampTZ(_) => "TIMESTAMP WITH TIME ZONE".to_string(),
        OracleType::TimestampLTZ(_) => "TIMESTAMP WITH LOCAL TIME ZONE".to_string(),
        OracleType::CLOB => "CLOB".to_string(),
        OracleType::NCLOB => "NCLOB".to_string(),
        OracleType::Long => "LONG".to_string(),
        other => format!("{other:?}").to_ascii_uppercase(),
    }
}

struct BufferedCursor {
    columns: Vec<ColumnMeta>,
    rows: std::vec::IntoIter<Vec<ScanTarget>>,
}

impl Cursor for BufferedCursor {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn scan(&mut self, targets: &mut [ScanTarget]) -> Result<bool, DriverError> {
        let Some(row) = self.rows.next() else {
            return Ok(false);
        };
        for (column, (target, cell)) in targets.iter_mut().zip(row).enumerate() {
            target
                .fill(cell)
                .map_err(|message| DriverError::Scan { column, message })?;
        }
        Ok(true)
    }
}
