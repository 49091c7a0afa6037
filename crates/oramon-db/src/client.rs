//! Connection manager: one physical connection, one query at a time.
//!
//! # Architecture
//!
//! ```text
//! init()                   reads config, connects root, pings
//! reinit_with_tenant(t)    closes current handle, sets tenant override, reconnects
//! execute_query(ctx, ..)   waits for the slot ─▶ Session::query ─▶ ResultSet (holds slot)
//! fetch_rows(ctx, ..)      execute_query ─▶ RowDecoder::decode_all ─▶ slot released
//! close_connection()       waits for the slot, closes the handle (no-op when closed)
//! ```
//!
//! The slot is a one-permit semaphore. Concurrent callers queue on it, so
//! the monitored database never sees more than one statement from us at a
//! time. The driver call runs in its own task that owns the permit: a query
//! that outlives its deadline is interrupted and the caller returns at
//! once, but the slot is only released when the interrupted call itself
//! comes back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::context::{Interrupted, QueryContext};
use crate::decode::{ColumnMeta, Row, RowDecoder};
use crate::driver::{Cursor, Driver, Param, Session};
use crate::error::{ConfigError, DbError, DbResult, DecodeError, DriverError};

/// Physical connections the manager will ever hold.
///
/// Raising this changes the load profile on the monitored database.
pub const MAX_CONNECTIONS: usize = 1;

struct Handle {
    session: Arc<dyn Session>,
    target: String,
}

#[derive(Default)]
struct ClientState {
    config: Option<TargetConfig>,
    handle: Option<Handle>,
}

/// Owns the single connection to the monitored database.
pub struct DbClient {
    config_path: PathBuf,
    driver: Arc<dyn Driver>,
    state: Mutex<ClientState>,
    slot: Arc<Semaphore>,
}

impl DbClient {
    pub fn new(config_path: impl Into<PathBuf>, driver: Arc<dyn Driver>) -> Self {
        Self {
            config_path: config_path.into(),
            driver,
            state: Mutex::new(ClientState::default()),
            slot: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// The configuration loaded by the last successful `init`.
    pub async fn config(&self) -> Option<TargetConfig> {
        self.state.lock().await.config.clone()
    }

    /// Tenant list from the loaded configuration, in configured order.
    pub async fn tenants(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .config
            .as_ref()
            .map(|c| c.pdbs.clone())
            .unwrap_or_default()
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.handle.is_some()
    }

    /// Connect string of the open handle.
    pub async fn current_target(&self) -> Option<String> {
        self.state
            .lock()
            .await
            .handle
            .as_ref()
            .map(|h| h.target.clone())
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Load the configuration file and connect to the root container.
    ///
    /// The file is read on every call. Any handle left open by a previous
    /// cycle is closed first.
    pub async fn init(&self) -> DbResult<()> {
        let config = TargetConfig::from_file(&self.config_path)?;
        let mut state = self.state.lock().await;
        self.teardown(&mut state).await?;
        state.config = Some(config);
        self.open(&mut state).await
    }

    /// Close the current handle and reconnect scoped to `tenant`.
    pub async fn reinit_with_tenant(&self, tenant: &str) -> DbResult<()> {
        let mut state = self.state.lock().await;
        self.teardown(&mut state).await?;
        let config = state.config.as_mut().ok_or_else(|| {
            ConfigError::Invalid("reinit_with_tenant called before init".to_string())
        })?;
        config.set_active_tenant(tenant);
        self.open(&mut state).await
    }

    /// Release the current handle. A no-op when none is open.
    pub async fn close_connection(&self) -> DbResult<()> {
        let mut state = self.state.lock().await;
        self.teardown(&mut state).await
    }

    async fn open(&self, state: &mut ClientState) -> DbResult<()> {
        let config = state
            .config
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("no configuration loaded".to_string()))?;
        let target = config.connect_target()?;
        info!(
            connect_string = %target.connect_string,
            user = %target.username,
            tenant = target.tenant.as_deref().unwrap_or("-"),
            "connecting to oracle"
        );

        let session: Arc<dyn Session> = self
            .driver
            .connect(&target)
            .await
            .map_err(|source| DbError::Connect {
                target: target.connect_string.clone(),
                source,
            })?
            .into();

        if let Err(source) = session.ping().await {
            if let Err(e) = session.close().await {
                debug!(error = %e, "close after failed ping");
            }
            return Err(DbError::Connect {
                target: target.connect_string,
                source,
            });
        }

        state.handle = Some(Handle {
            session,
            target: target.connect_string,
        });
        Ok(())
    }

    async fn teardown(&self, state: &mut ClientState) -> DbResult<()> {
        let Some(handle) = state.handle.take() else {
            return Ok(());
        };
        // Wait out any result set still holding the slot.
        let _permit = self.slot.acquire().await.ok();
        handle.session.close().await.map_err(|source| DbError::Close {
            target: handle.target.clone(),
            source,
        })?;
        debug!(connect_string = %handle.target, "connection closed");
        Ok(())
    }

    async fn session(&self) -> DbResult<(Arc<dyn Session>, String)> {
        let state = self.state.lock().await;
        state
            .handle
            .as_ref()
            .map(|h| (Arc::clone(&h.session), h.target.clone()))
            .ok_or(DbError::NotConnected)
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Run a parameterized query under `ctx`.
    ///
    /// The returned [`ResultSet`] occupies the connection slot until it is
    /// dropped or decoded.
    pub async fn execute_query(
        &self,
        ctx: &QueryContext,
        sql: &str,
        params: &[Param],
    ) -> DbResult<ResultSet> {
        let (session, connect_string) = self.session().await?;

        // Still queued on the slot: nothing was issued, nothing to interrupt.
        let permit = match ctx.run(Arc::clone(&self.slot).acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(classify(sql, DriverError::Closed)),
            Err(why) => {
                debug!(%connect_string, query = sql, reason = ?why, "gave up waiting for the slot");
                return Err(interrupted(ctx, sql, why));
            }
        };

        let mut call = {
            let session = Arc::clone(&session);
            let sql = sql.to_string();
            let params = params.to_vec();
            tokio::spawn(async move {
                let result = session.query(&sql, &params).await;
                (permit, result)
            })
        };

        match ctx.run(&mut call).await {
            Ok(Ok((permit, Ok(cursor)))) => Ok(ResultSet {
                sql: sql.to_string(),
                cursor,
                _permit: permit,
            }),
            Ok(Ok((_permit, Err(source)))) => {
                warn!(%connect_string, error = %source, query = sql, "query failed");
                Err(classify(sql, source))
            }
            Ok(Err(join)) => {
                warn!(%connect_string, error = %join, query = sql, "query task failed");
                Err(classify(sql, DriverError::Query(format!("query task failed: {join}"))))
            }
            Err(why) => {
                // The detached call keeps the permit until the driver
                // returns from the interrupt.
                session.interrupt();
                warn!(%connect_string, timeout = ?ctx.timeout(), query = sql, reason = ?why, "query interrupted");
                Err(interrupted(ctx, sql, why))
            }
        }
    }

    /// Execute, decode every row, and release the cursor.
    pub async fn fetch_rows(
        &self,
        ctx: &QueryContext,
        sql: &str,
        params: &[Param],
    ) -> DbResult<Vec<Row>> {
        let result = self.execute_query(ctx, sql, params).await?;
        let rows = result.decode_all().map_err(|source| {
            warn!(error = %source, query = sql, "decode failed");
            DbError::Decode {
                sql: sql.to_string(),
                source,
            }
        })?;
        debug!(rows = rows.len(), query = sql, "fetched rows");
        Ok(rows)
    }
}

fn interrupted(ctx: &QueryContext, sql: &str, why: Interrupted) -> DbError {
    match why {
        Interrupted::Timeout => DbError::Timeout {
            sql: sql.to_string(),
            timeout: ctx.timeout(),
        },
        Interrupted::Cancelled => DbError::Cancelled {
            sql: sql.to_string(),
        },
    }
}

fn classify(sql: &str, source: DriverError) -> DbError {
    match source {
        DriverError::Scan { .. } | DriverError::Fetch(_) => DbError::Decode {
            sql: sql.to_string(),
            source: DecodeError::from(source),
        },
        source => DbError::Query {
            sql: sql.to_string(),
            source,
        },
    }
}

/// Open cursor over one query's rows. Holds the connection slot.
pub struct ResultSet {
    sql: String,
    cursor: Box<dyn Cursor>,
    _permit: OwnedSemaphorePermit,
}

impl ResultSet {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        self.cursor.columns()
    }

    /// Decode all remaining rows; the slot is released when this returns.
    pub fn decode_all(mut self) -> Result<Vec<Row>, DecodeError> {
        let decoder = RowDecoder::new(self.cursor.columns());
        decoder.decode_all(self.cursor.as_mut())
    }
}
