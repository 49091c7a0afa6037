//! Per-statement statistics from AWR snapshots.
//!
//! Snapshots are immutable once written, so each one is reported at most
//! once: the ledger file records every snapshot already emitted and
//! survives restarts. A snapshot's samples are committed right after its
//! key is saved, so a later snapshot failing in the same run cannot take
//! them down with it. Discovery itself runs at most once per
//! `snapshot_interval`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oramon_db::Param;
use oramon_ledger::{LedgerFile, SnapshotKey, unix_now};
use oramon_metrics::{Desc, MetricKind, MetricRegistry, MetricResult};
use tracing::{debug, info};

use crate::config::ExporterConfig;
use crate::error::CollectResult;
use crate::scraper::{ScrapeContext, Scraper};
use crate::throttle::IntervalGate;

const LABELS: &[&str] = &[
    "snap_id",
    "begin_time",
    "end_time",
    "sql_id",
    "parsing_schema",
    "sql_text",
    "version_count",
    "executions",
    "sorts",
    "disk_reads",
    "buffer_gets",
    "cpu_time",
    "elapsed_time",
    "parse_calls",
    "rows_processed",
];

const SNAPSHOT_SQL: &str = "select to_char(s.dbid),
  to_char(sys_extract_utc(s.startup_time), 'yyyy-mm-dd hh24:mi:ss'),
  to_char(sys_extract_utc(s.begin_interval_time), 'yyyy-mm-dd hh24:mi:ss'),
  to_char(sys_extract_utc(s.end_interval_time), 'yyyy-mm-dd hh24:mi:ss'),
  to_char(s.snap_id), to_char(s.instance_number)
from dba_hist_snapshot s, v$instance b
where s.end_interval_time >= sysdate - :1 / 24
  and s.instance_number = b.instance_number
order by s.snap_id";

// Every column is rendered as text so fractional averages survive as
// label values.
const DETAIL_SQL: &str = "select to_char(s.snap_id),
  to_char(s.begin_interval_time, 'yyyy-mm-dd hh24:mi:ss'),
  to_char(s.end_interval_time, 'yyyy-mm-dd hh24:mi:ss'),
  t.sql_id, t.parsing_schema_name, to_char(substr(x.sql_text, 1, 4000)),
  to_char(t.version_count), to_char(t.executions_delta),
  to_char(round(t.sorts_delta / decode(t.executions_delta, 0, 1, t.executions_delta), 4)),
  to_char(round(t.disk_reads_delta / decode(t.executions_delta, 0, 1, t.executions_delta), 4)),
  to_char(round(t.buffer_gets_delta / decode(t.executions_delta, 0, 1, t.executions_delta), 4)),
  to_char(round(t.cpu_time_delta / 1000 / decode(t.executions_delta, 0, 1, t.executions_delta), 4)),
  to_char(round(t.elapsed_time_delta / 1000 / decode(t.executions_delta, 0, 1, t.executions_delta), 4)),
  to_char(round(t.parse_calls_delta / decode(t.executions_delta, 0, 1, t.executions_delta), 4)),
  to_char(round(t.rows_processed_delta / decode(t.executions_delta, 0, 1, t.executions_delta), 2))
from dba_hist_snapshot s, dba_hist_sqlstat t, dba_hist_sqltext x
where s.dbid = :1 and s.snap_id = :2 and s.instance_number = :3
  and t.dbid = s.dbid and t.snap_id = s.snap_id and t.instance_number = s.instance_number
  and x.dbid = t.dbid and x.sql_id = t.sql_id
  and (t.buffer_gets_delta > 0 or t.executions_delta > 0)";

pub struct SqlSnapshotScraper {
    desc: Arc<Desc>,
    gate: IntervalGate,
    lookback: Duration,
    ledger: LedgerFile,
    retention: Duration,
}

impl SqlSnapshotScraper {
    pub fn new(registry: &MetricRegistry, config: &ExporterConfig) -> MetricResult<Self> {
        Ok(Self {
            desc: registry.describe("sql", "snap", "Oracle SQL Stats", LABELS, MetricKind::Gauge)?,
            gate: IntervalGate::new(config.snapshot_interval),
            lookback: config.snapshot_lookback,
            ledger: LedgerFile::new(PathBuf::from(&config.ledger_path)),
            retention: config.ledger_retention,
        })
    }

    fn lookback_hours(&self) -> f64 {
        self.lookback.as_secs_f64() / 3600.0
    }

    async fn emit_snapshot(&self, ctx: &ScrapeContext, key: &SnapshotKey) -> CollectResult<usize> {
        let params = [
            Param::from(key.dbid.as_str()),
            Param::from(key.snap_id.as_str()),
            Param::from(key.instance_number.as_str()),
        ];
        let rows = ctx.fetch(DETAIL_SQL, &params).await?;
        for r in &rows {
            let labels = (0..LABELS.len()).map(|i| r.label(i)).collect::<Result<Vec<_>, _>>()?;
            ctx.emit(&self.desc, 1.0, labels)?;
        }
        Ok(rows.len())
    }
}

#[async_trait]
impl Scraper for SqlSnapshotScraper {
    fn name(&self) -> &'static str {
        "sql_snapshot"
    }

    fn help(&self) -> &'static str {
        "collect per-statement stats from new AWR snapshots"
    }

    fn root_only(&self) -> bool {
        true
    }

    async fn scrape(&self, ctx: &ScrapeContext) -> CollectResult<()> {
        let gate_key = &ctx.info().tenant.con_id;
        if let Some(remaining) = self.gate.remaining(gate_key) {
            debug!(remaining = ?remaining, "snapshot discovery ran recently, skipping");
            return Ok(());
        }

        let mut ledger = self.ledger.load();
        let candidates = ctx.fetch(SNAPSHOT_SQL, &[Param::Float(self.lookback_hours())]).await?;
        for r in &candidates {
            let key = SnapshotKey::new(r.label(0)?, r.label(5)?, r.label(4)?);
            if ledger.processed(&key) {
                debug!(snapshot = %key, "snapshot already reported");
                continue;
            }
            let statements = self.emit_snapshot(ctx, &key).await?;
            ledger.mark_processed(&key);
            let dropped = ledger.compact(unix_now(), self.retention);
            self.ledger.save(&ledger)?;
            ctx.commit();
            info!(snapshot = %key, statements, dropped, "reported snapshot");
        }
        self.gate.mark(gate_key);
        Ok(())
    }
}
