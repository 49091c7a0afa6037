//! Scripted in-memory driver for tests.
//!
//! Replies are matched by substring against the query text. Rules bound
//! to a parameter value win over unbound ones, and tenant specific rules
//! win over global ones. Everything the driver
//! sees (connects, queries, interrupts) is recorded for assertions, and the
//! number of concurrently executing queries is tracked so tests can check
//! the single-slot policy.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::decode::{ColumnMeta, ScanTarget};
use crate::driver::{ConnectTarget, Cursor, Driver, Param, Session};
use crate::error::DriverError;

// ── Cell helpers ───────────────────────────────────────────────────

pub fn text(s: &str) -> ScanTarget {
    ScanTarget::Text(Some(s.to_string()))
}

pub fn num(v: f64) -> ScanTarget {
    ScanTarget::Number(Some(v))
}

pub fn null_text() -> ScanTarget {
    ScanTarget::Text(None)
}

pub fn null_num() -> ScanTarget {
    ScanTarget::Number(None)
}

pub fn raw(bytes: &[u8]) -> ScanTarget {
    ScanTarget::Binary(Some(bytes.to_vec()))
}

// ── Replies ────────────────────────────────────────────────────────

/// Scripted outcome of one query.
#[derive(Debug, Clone)]
pub struct Reply {
    columns: Vec<ColumnMeta>,
    rows: Vec<Vec<ScanTarget>>,
    error: Option<String>,
    delay: Option<Duration>,
    ignores_interrupts: bool,
}

impl Reply {
    /// Rows under `(name, type_tag)` columns.
    pub fn rows(columns: &[(&str, &str)], rows: Vec<Vec<ScanTarget>>) -> Self {
        Self {
            columns: columns.iter().map(|(n, t)| ColumnMeta::new(*n, *t)).collect(),
            rows,
            error: None,
            delay: None,
            ignores_interrupts: false,
        }
    }

    pub fn empty(columns: &[(&str, &str)]) -> Self {
        Self::rows(columns, Vec::new())
    }

    pub fn error(message: &str) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            error: Some(message.to_string()),
            delay: None,
            ignores_interrupts: false,
        }
    }

    /// Hold the query in flight for `delay` before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sit out the whole delay even when the session is interrupted, like
    /// a call the server is slow to abandon.
    pub fn ignoring_interrupts(mut self) -> Self {
        self.ignores_interrupts = true;
        self
    }
}

struct Rule {
    tenant: Option<String>,
    pattern: String,
    param: Option<Param>,
    reply: Reply,
}

impl Rule {
    fn matches(&self, tenant: Option<&str>, sql: &str, params: &[Param]) -> bool {
        (self.tenant.is_none() || self.tenant.as_deref() == tenant)
            && sql.contains(&self.pattern)
            && self.param.as_ref().is_none_or(|p| params.contains(p))
    }
}

/// One query as seen by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuery {
    pub tenant: Option<String>,
    pub sql: String,
    pub params: Vec<Param>,
}

#[derive(Default)]
struct Script {
    rules: Vec<Rule>,
    refused: HashSet<Option<String>>,
    failing_pings: HashSet<Option<String>>,
    connects: Vec<ConnectTarget>,
    queries: Vec<RecordedQuery>,
    open_sessions: usize,
    in_flight: usize,
    max_in_flight: usize,
    interrupts: usize,
}

/// Driver whose behaviour is scripted by the test.
#[derive(Clone, Default)]
pub struct ScriptedDriver {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer any query containing `pattern`, on any target.
    pub fn on(&self, pattern: &str, reply: Reply) -> &Self {
        self.lock().rules.push(Rule {
            tenant: None,
            pattern: pattern.to_string(),
            param: None,
            reply,
        });
        self
    }

    /// Answer queries containing `pattern` that bind `param`, on any target.
    pub fn on_bound(&self, pattern: &str, param: Param, reply: Reply) -> &Self {
        self.lock().rules.push(Rule {
            tenant: None,
            pattern: pattern.to_string(),
            param: Some(param),
            reply,
        });
        self
    }

    /// Answer queries containing `pattern` on sessions scoped to `tenant`.
    pub fn on_tenant(&self, tenant: &str, pattern: &str, reply: Reply) -> &Self {
        self.lock().rules.push(Rule {
            tenant: Some(tenant.to_string()),
            pattern: pattern.to_string(),
            param: None,
            reply,
        });
        self
    }

    /// Fail connects to `tenant` (`None` = the root container).
    pub fn refuse_connect(&self, tenant: Option<&str>) -> &Self {
        self.lock().refused.insert(tenant.map(str::to_string));
        self
    }

    /// Connect succeeds but the liveness ping fails.
    pub fn fail_ping(&self, tenant: Option<&str>) -> &Self {
        self.lock().failing_pings.insert(tenant.map(str::to_string));
        self
    }

    pub fn connects(&self) -> Vec<ConnectTarget> {
        self.lock().connects.clone()
    }

    pub fn queries(&self) -> Vec<RecordedQuery> {
        self.lock().queries.clone()
    }

    /// Number of queries whose text contains `pattern`.
    pub fn query_count(&self, pattern: &str) -> usize {
        self.lock()
            .queries
            .iter()
            .filter(|q| q.sql.contains(pattern))
            .count()
    }

    /// Queries issued on sessions scoped to `tenant`.
    pub fn queries_for(&self, tenant: Option<&str>) -> Vec<RecordedQuery> {
        self.lock()
            .queries
            .iter()
            .filter(|q| q.tenant.as_deref() == tenant)
            .cloned()
            .collect()
    }

    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }

    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    pub fn interrupts(&self) -> usize {
        self.lock().interrupts
    }

    fn reply_for(&self, tenant: Option<&str>, sql: &str, params: &[Param]) -> Option<Reply> {
        self.lock()
            .rules
            .iter()
            .filter(|r| r.matches(tenant, sql, params))
            .min_by_key(|r| (r.param.is_none(), r.tenant.is_none()))
            .map(|r| r.reply.clone())
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn Session>, DriverError> {
        let mut script = self.lock();
        script.connects.push(target.clone());
        if script.refused.contains(&target.tenant) {
            return Err(DriverError::Connect(format!(
                "ORA-12514: listener does not currently know of service {}",
                target.connect_string
            )));
        }
        script.open_sessions += 1;
        Ok(Box::new(ScriptedSession {
            driver: self.clone(),
            tenant: target.tenant.clone(),
            closed: AtomicBool::new(false),
            interrupted: Notify::new(),
        }))
    }
}

struct ScriptedSession {
    driver: ScriptedDriver,
    tenant: Option<String>,
    closed: AtomicBool,
    interrupted: Notify,
}

/// Decrements the in-flight counter even when the query future is dropped.
struct InFlight<'a>(&'a ScriptedDriver);

impl<'a> InFlight<'a> {
    fn enter(driver: &'a ScriptedDriver) -> Self {
        let mut script = driver.lock();
        script.in_flight += 1;
        script.max_in_flight = script.max_in_flight.max(script.in_flight);
        Self(driver)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.lock().in_flight -= 1;
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn ping(&self) -> Result<(), DriverError> {
        if self.driver.lock().failing_pings.contains(&self.tenant) {
            return Err(DriverError::Connect(
                "ORA-03113: end-of-file on communication channel".to_string(),
            ));
        }
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Param]) -> Result<Box<dyn Cursor>, DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Closed);
        }
        self.driver.lock().queries.push(RecordedQuery {
            tenant: self.tenant.clone(),
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        let _guard = InFlight::enter(&self.driver);
        let reply = self
            .driver
            .reply_for(self.tenant.as_deref(), sql, params)
            .ok_or_else(|| DriverError::Query(format!("ORA-00942: no scripted reply for: {sql}")))?;
        if let Some(delay) = reply.delay {
            if reply.ignores_interrupts {
                tokio::time::sleep(delay).await;
            } else {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.interrupted.notified() => {
                        return Err(DriverError::Query(
                            "ORA-01013: user requested cancel of current operation".to_string(),
                        ));
                    }
                }
            }
        }
        if let Some(message) = reply.error {
            return Err(DriverError::Query(message));
        }
        Ok(Box::new(ScriptedCursor {
            columns: reply.columns,
            rows: reply.rows.into_iter(),
        }))
    }

    fn interrupt(&self) {
        self.driver.lock().interrupts += 1;
        self.interrupted.notify_waiters();
    }

    async fn close(&self) -> Result<(), DriverError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.driver.lock().open_sessions -= 1;
        }
        Ok(())
    }
}

struct ScriptedCursor {
    columns: Vec<ColumnMeta>,
    rows: std::vec::IntoIter<Vec<ScanTarget>>,
}

impl Cursor for ScriptedCursor {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn scan(&mut self, targets: &mut [ScanTarget]) -> Result<bool, DriverError> {
        let Some(row) = self.rows.next() else {
            return Ok(false);
        };
        if row.len() != targets.len() {
            return Err(DriverError::Fetch(format!(
                "row has {} cells for {} columns",
                row.len(),
                targets.len()
            )));
        }
        for (column, (target, cell)) in targets.iter_mut().zip(row).enumerate() {
            target
                .fill(cell)
                .map_err(|message| DriverError::Scan { column, message })?;
        }
        Ok(true)
    }
}
