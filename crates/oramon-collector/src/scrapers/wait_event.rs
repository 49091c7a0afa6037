//! Cumulative waits per event for the user-relevant wait classes.

use std::sync::Arc;

use async_trait::async_trait;
use oramon_metrics::{Desc, MetricKind, MetricRegistry, MetricResult};

use crate::error::CollectResult;
use crate::scraper::{ScrapeContext, Scraper, placeholders, text_params};

pub const WAIT_CLASSES: &[&str] = &[
    "Application",
    "Commit",
    "Concurrency",
    "Configuration",
    "Network",
    "System I/O",
    "User I/O",
];

const LABELS: &[&str] = &["wait_class", "event", "con_id", "con_name"];

pub struct WaitEventScraper {
    total_event: Arc<Desc>,
    total_time: Arc<Desc>,
}

impl WaitEventScraper {
    pub fn new(registry: &MetricRegistry) -> MetricResult<Self> {
        Ok(Self {
            total_event: registry.describe("wait", "total_event", "Oracle Waits", LABELS, MetricKind::Counter)?,
            total_time: registry.describe("wait", "total_time", "Oracle Waited Time", LABELS, MetricKind::Counter)?,
        })
    }
}

#[async_trait]
impl Scraper for WaitEventScraper {
    fn name(&self) -> &'static str {
        "wait_event"
    }

    fn help(&self) -> &'static str {
        "collect stats from v$system_event"
    }

    async fn scrape(&self, ctx: &ScrapeContext) -> CollectResult<()> {
        let con_id = if ctx.legacy() { "0 as con_id" } else { "con_id" };
        let sql = format!(
            "select event, wait_class, total_waits, time_waited, {con_id}
from v$system_event
where wait_class in ({})",
            placeholders(WAIT_CLASSES.len())
        );
        for r in ctx.fetch(&sql, &text_params(WAIT_CLASSES)).await? {
            let labels = vec![
                r.text(1)?.to_string(),
                r.text(0)?.to_string(),
                r.label(4)?,
                ctx.info().con_name(),
            ];
            ctx.emit(&self.total_event, r.number(2)?, labels.clone())?;
            ctx.emit(&self.total_time, r.number(3)?, labels)?;
        }
        Ok(())
    }
}
