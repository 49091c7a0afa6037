//! Transactions that have been active for at least a minute.

use std::sync::Arc;

use async_trait::async_trait;
use oramon_metrics::{Desc, MetricKind, MetricRegistry, MetricResult};

use crate::error::CollectResult;
use crate::scraper::{ScrapeContext, Scraper};

const LABELS: &[&str] = &[
    "con_id",
    "sid",
    "serial",
    "session_status",
    "sql_id",
    "prev_sql_id",
    "start_time",
];

/// Age, in seconds, from which a transaction is reported.
pub const MIN_DURATION_SECS: u32 = 60;

fn transaction_sql(con_id: &str) -> String {
    format!(
        "select {con_id}, b.sid, b.serial#, b.status as session_status, b.sql_id, b.prev_sql_id,
  to_char(a.start_date, 'yyyy-mm-dd hh24:mi:ss') as start_time,
  a.status as transaction_status,
  (sysdate - a.start_date) * 86400 as duration,
  a.used_ublk, a.used_urec
from v$transaction a, v$session b
where a.addr = b.taddr
  and a.status = 'ACTIVE'
  and (sysdate - a.start_date) * 86400 >= {MIN_DURATION_SECS}"
    )
}

pub struct TransactionScraper {
    duration: Arc<Desc>,
    undo_block: Arc<Desc>,
    undo_record: Arc<Desc>,
}

impl TransactionScraper {
    pub fn new(registry: &MetricRegistry) -> MetricResult<Self> {
        let gauge = |name: &str, help: &str| registry.describe("transaction", name, help, LABELS, MetricKind::Gauge);
        Ok(Self {
            duration: gauge("duration", "Seconds the transaction has been open")?,
            undo_block: gauge("undo_block", "Undo blocks used by the transaction")?,
            undo_record: gauge("undo_record", "Undo records used by the transaction")?,
        })
    }
}

#[async_trait]
impl Scraper for TransactionScraper {
    fn name(&self) -> &'static str {
        "transaction"
    }

    fn help(&self) -> &'static str {
        "collect long running transactions from v$transaction"
    }

    async fn scrape(&self, ctx: &ScrapeContext) -> CollectResult<()> {
        let con_id = if ctx.legacy() { "0 as con_id" } else { "b.con_id" };
        for r in ctx.fetch(&transaction_sql(con_id), &[]).await? {
            let labels = (0..=6).map(|i| r.label(i)).collect::<Result<Vec<_>, _>>()?;
            ctx.emit(&self.duration, r.number(8)?, labels.clone())?;
            ctx.emit(&self.undo_block, r.number(9)?, labels.clone())?;
            ctx.emit(&self.undo_record, r.number(10)?, labels)?;
        }
        Ok(())
    }
}
