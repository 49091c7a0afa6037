//! The collection task contract and the context tasks run in.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oramon_db::{DbClient, Param, QueryContext, Row};
use oramon_metrics::{Desc, MetricKind, MetricRegistry, SampleSink};
use tokio_util::sync::CancellationToken;

use crate::error::CollectResult;
use crate::info::TargetInfo;
use crate::version::Version;

/// One independent collection task.
///
/// Tasks build their fixed descriptors when constructed and run once per
/// pass, concurrently with every other task of the same pass.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Short name, used as the `collector` label on error counters and in
    /// `disabled_collectors`.
    fn name(&self) -> &'static str;

    fn help(&self) -> &'static str;

    /// Oldest release the task's queries work on.
    fn min_version(&self) -> Version {
        Version::new(10, 2)
    }

    /// Instance-wide tasks report once, from the root pass.
    fn root_only(&self) -> bool {
        false
    }

    async fn scrape(&self, ctx: &ScrapeContext) -> CollectResult<()>;
}

/// Handles a task needs during one pass.
#[derive(Clone)]
pub struct ScrapeContext {
    client: Arc<DbClient>,
    info: Arc<TargetInfo>,
    registry: Arc<MetricRegistry>,
    sink: SampleSink,
    query_timeout: Duration,
    cancel: CancellationToken,
}

impl ScrapeContext {
    pub fn new(
        client: Arc<DbClient>,
        info: Arc<TargetInfo>,
        registry: Arc<MetricRegistry>,
        sink: SampleSink,
        query_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            info,
            registry,
            sink,
            query_timeout,
            cancel,
        }
    }

    pub fn info(&self) -> &TargetInfo {
        &self.info
    }

    /// Pre-12 releases have no `con_id` columns.
    pub fn legacy(&self) -> bool {
        !self.info.is_multitenant()
    }

    /// Run a query with the configured per-query deadline.
    pub async fn fetch(&self, sql: &str, params: &[Param]) -> CollectResult<Vec<Row>> {
        let ctx = QueryContext::with_timeout(self.query_timeout).with_cancel(self.cancel.child_token());
        Ok(self.client.fetch_rows(&ctx, sql, params).await?)
    }

    pub fn emit(&self, desc: &Arc<Desc>, value: f64, label_values: Vec<String>) -> CollectResult<()> {
        Ok(self.sink.emit(desc, value, label_values)?)
    }

    /// Keep every sample emitted so far, even if the task fails afterwards.
    /// Without a commit a failed task contributes nothing.
    pub fn commit(&self) {
        self.sink.commit();
    }

    /// Descriptor for a family whose name comes from query results.
    pub fn describe(
        &self,
        subsystem: &str,
        name: &str,
        help: &str,
        labels: &[&str],
        kind: MetricKind,
    ) -> CollectResult<Arc<Desc>> {
        Ok(self.registry.describe(subsystem, name, help, labels, kind)?)
    }
}

/// `:1, :2, ..., :n` for an IN-list of `n` constants.
pub fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!(":{i}")).collect::<Vec<_>>().join(", ")
}

/// `part` as a percentage of `whole`; 0 when `whole` is 0.
pub fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 { 0.0 } else { part * 100.0 / whole }
}

/// Bind parameters for a list of constant names.
pub fn text_params(values: &[&str]) -> Vec<Param> {
    values.iter().map(|v| Param::from(*v)).collect()
}
