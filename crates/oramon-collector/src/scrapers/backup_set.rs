//! RMAN backup sets, listed at most once per interval and tenant.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oramon_metrics::{Desc, MetricKind, MetricRegistry, MetricResult};
use tracing::debug;

use crate::error::CollectResult;
use crate::scraper::{ScrapeContext, Scraper};
use crate::throttle::IntervalGate;

const LABELS: &[&str] = &[
    "bs_key",
    "recid",
    "stamp",
    "start_time",
    "completion_time",
    "backup_type",
    "con_id",
    "con_name",
];

fn backup_sql(con_id: &str) -> String {
    format!(
        "select bs_key, recid, stamp,
  to_char(start_time, 'yyyy-mm-dd hh24:mi:ss'),
  to_char(completion_time, 'yyyy-mm-dd hh24:mi:ss'),
  elapsed_seconds, output_bytes, backup_type, {con_id}
from v$backup_set_details"
    )
}

pub struct BackupSetScraper {
    desc: Arc<Desc>,
    gate: IntervalGate,
}

impl BackupSetScraper {
    pub fn new(registry: &MetricRegistry, interval: Duration) -> MetricResult<Self> {
        Ok(Self {
            desc: registry.describe("backupset", "size", "Oracle Backup Set Size", LABELS, MetricKind::Gauge)?,
            gate: IntervalGate::new(interval),
        })
    }
}

#[async_trait]
impl Scraper for BackupSetScraper {
    fn name(&self) -> &'static str {
        "backup_set"
    }

    fn help(&self) -> &'static str {
        "collect backup sets from v$backup_set_details"
    }

    async fn scrape(&self, ctx: &ScrapeContext) -> CollectResult<()> {
        let key = &ctx.info().tenant.con_id;
        if let Some(remaining) = self.gate.remaining(key) {
            debug!(con_id = %key, remaining = ?remaining, "backup sets listed recently, skipping");
            return Ok(());
        }

        let con_id = if ctx.legacy() { "0 as con_id" } else { "con_id" };
        for r in ctx.fetch(&backup_sql(con_id), &[]).await? {
            let labels = vec![
                r.label(0)?,
                r.label(1)?,
                r.label(2)?,
                r.label(3)?,
                r.label(4)?,
                r.label(7)?,
                r.label(8)?,
                ctx.info().con_name(),
            ];
            ctx.emit(&self.desc, r.number(6)?, labels)?;
        }
        self.gate.mark(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use oramon_db::testing::{Reply, num, text};

    use super::*;
    use crate::test_support::*;

    fn backup_reply() -> Reply {
        Reply::rows(
            &[
                ("BS_KEY", N),
                ("RECID", N),
                ("STAMP", N),
                ("START_TIME", T),
                ("COMPLETION_TIME", T),
                ("ELAPSED_SECONDS", N),
                ("OUTPUT_BYTES", N),
                ("BACKUP_TYPE", T),
                ("CON_ID", N),
            ],
            vec![vec![
                num(12.0),
                num(12.0),
                num(1155632412.0),
                text("2024-01-01 02:00:00"),
                text("2024-01-01 02:04:10"),
                num(250.0),
                num(7.5e9),
                text("D"),
                num(1.0),
            ]],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn lists_once_per_interval_and_tenant() {
        let h = Harness::new(&[]);
        h.driver.on("from v$backup_set_details", backup_reply());
        let scraper = BackupSetScraper::new(&h.registry, Duration::from_secs(600)).unwrap();

        let samples = h.run(&scraper, root19()).await.unwrap();
        let set = find(&samples, "oracle_backupset_size", &[("bs_key", "12"), ("backup_type", "D")]);
        assert_eq!(set.value, 7.5e9);
        assert_eq!(set.label("con_name"), Some("CDB$ROOT"));

        assert!(h.run(&scraper, root19()).await.unwrap().is_empty());
        let tenant = target_info(crate::Version::new(19, 3), "3", "PDB1", true);
        assert_eq!(h.run(&scraper, tenant).await.unwrap().len(), 1);
        assert_eq!(h.driver.query_count("from v$backup_set_details"), 2);

        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(h.run(&scraper, root19()).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_listing_is_retried_next_cycle() {
        let h = Harness::new(&[]);
        h.driver.on("from v$backup_set_details", Reply::error("ORA-01031: insufficient privileges"));
        let scraper = BackupSetScraper::new(&h.registry, Duration::from_secs(600)).unwrap();

        assert!(h.run(&scraper, root19()).await.is_err());
        assert!(scraper.gate.ready("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn legacy_targets_select_constant_con_id() {
        let h = Harness::new(&[]);
        h.driver.on("from v$backup_set_details", backup_reply());
        let scraper = BackupSetScraper::new(&h.registry, Duration::from_secs(600)).unwrap();
        h.run(&scraper, legacy11()).await.unwrap();
        assert!(h.driver.queries()[0].sql.contains("0 as con_id"));
    }
}
