//! Tablespace capacity and usage.
//!
//! Five listings are joined by tablespace name: the tablespace catalog,
//! allocated and extensible bytes from data and temp files, free bytes,
//! used temp blocks, and recycle bin blocks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use oramon_metrics::{Desc, MetricKind, MetricRegistry, MetricResult};
use tracing::info;

use crate::error::{CollectError, CollectResult};
use crate::scraper::{ScrapeContext, Scraper, percent};

const META_SQL: &str = "select tablespace_name, contents, status, block_size from dba_tablespaces";

const FILES_SQL: &str = "select tablespace_name,
  sum(bytes) as space_total,
  sum(case when autoextensible = 'YES' then maxbytes - bytes else 0 end) as space_extensible
from dba_data_files
where status = 'AVAILABLE'
group by tablespace_name
union all
select tablespace_name,
  sum(bytes) as space_total,
  sum(case when autoextensible = 'YES' then maxbytes - bytes else 0 end) as space_extensible
from dba_temp_files
where status = 'ONLINE'
group by tablespace_name";

const FREE_NONRECYCLEBIN_SQL: &str =
    "select tablespace_name, sum(bytes) as space_free from dba_free_space_nonrecyclebin group by tablespace_name";

const FREE_SQL: &str = "select tablespace_name, sum(bytes) as space_free from dba_free_space group by tablespace_name";

const TEMP_USED_SQL: &str = "select tablespace_name, sum(used_blocks) from v$sort_segment group by tablespace_name";

const RECYCLEBIN_SQL: &str = "select ts_name, sum(space) from dba_recyclebin group by ts_name";

/// Errors that mean the view is missing or not granted.
const NO_VIEW: &[&str] = &["ORA-00942", "ORA-01031"];

#[derive(Debug, Clone, Default, PartialEq)]
struct TablespaceUsage {
    name: String,
    contents: String,
    status: String,
    block_size: f64,
    total: f64,
    extensible: f64,
    used: f64,
    free: f64,
    recyclebin_used: f64,
}

impl TablespaceUsage {
    fn used_pct(&self) -> f64 {
        percent(self.used, self.total)
    }

    fn used_pct_ext(&self) -> f64 {
        percent(self.used, self.total + self.extensible)
    }
}

pub struct TablespaceScraper {
    stat: Arc<Desc>,
}

impl TablespaceScraper {
    pub fn new(registry: &MetricRegistry) -> MetricResult<Self> {
        Ok(Self {
            stat: registry.describe(
                "tablespace",
                "stat",
                "Oracle Tablespace Stats",
                &["tablespace_name", "contents", "status", "mode", "con_id", "con_name"],
                MetricKind::Gauge,
            )?,
        })
    }

    async fn by_name(ctx: &ScrapeContext, sql: &str) -> CollectResult<HashMap<String, f64>> {
        let mut out = HashMap::new();
        for r in ctx.fetch(sql, &[]).await? {
            out.insert(r.text(0)?.to_string(), r.number(1)?);
        }
        Ok(out)
    }

    async fn free_space(ctx: &ScrapeContext) -> CollectResult<HashMap<String, f64>> {
        match Self::by_name(ctx, FREE_NONRECYCLEBIN_SQL).await {
            Err(CollectError::Db(e)) if NO_VIEW.iter().any(|code| e.to_string().contains(code)) => {
                info!(error = %e, "dba_free_space_nonrecyclebin unavailable, falling back to dba_free_space");
                Self::by_name(ctx, FREE_SQL).await
            }
            other => other,
        }
    }

    async fn usage(ctx: &ScrapeContext) -> CollectResult<Vec<TablespaceUsage>> {
        let mut list = Vec::new();
        for r in ctx.fetch(META_SQL, &[]).await? {
            list.push(TablespaceUsage {
                name: r.text(0)?.to_string(),
                contents: r.text(1)?.to_string(),
                status: r.text(2)?.to_string(),
                block_size: r.number(3)?,
                ..Default::default()
            });
        }

        let mut files = HashMap::new();
        for r in ctx.fetch(FILES_SQL, &[]).await? {
            files.insert(r.text(0)?.to_string(), (r.number(1)?, r.number(2)?));
        }
        let free = Self::free_space(ctx).await?;
        let temp_used = Self::by_name(ctx, TEMP_USED_SQL).await?;
        let recyclebin = Self::by_name(ctx, RECYCLEBIN_SQL).await?;

        for ts in &mut list {
            if let Some((total, extensible)) = files.get(&ts.name) {
                ts.total = *total;
                ts.extensible = *extensible;
            }
            if let Some(blocks) = recyclebin.get(&ts.name) {
                ts.recyclebin_used = blocks * ts.block_size;
            }
            if ts.contents == "TEMPORARY" {
                if let Some(blocks) = temp_used.get(&ts.name) {
                    ts.used = blocks * ts.block_size;
                    ts.free = ts.total - ts.used;
                }
            } else {
                ts.free = free.get(&ts.name).copied().unwrap_or(0.0);
                ts.used = ts.total - ts.free;
            }
        }
        Ok(list)
    }
}

#[async_trait]
impl Scraper for TablespaceScraper {
    fn name(&self) -> &'static str {
        "tablespace"
    }

    fn help(&self) -> &'static str {
        "collect tablespace info from dba_tablespaces"
    }

    async fn scrape(&self, ctx: &ScrapeContext) -> CollectResult<()> {
        let tenant = &ctx.info().tenant;
        for ts in Self::usage(ctx).await? {
            let modes = [
                ("total", ts.total),
                ("extensible", ts.extensible),
                ("used", ts.used),
                ("used_pct", ts.used_pct()),
                ("used_pct_ext", ts.used_pct_ext()),
                ("free", ts.free),
                ("recyclebin_used", ts.recyclebin_used),
            ];
            for (mode, value) in modes {
                let labels = vec![
                    ts.name.clone(),
                    ts.contents.clone(),
                    ts.status.clone(),
                    mode.to_string(),
                    tenant.con_id.clone(),
                    tenant.con_name.clone(),
                ];
                ctx.emit(&self.stat, value, labels)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use oramon_db::testing::{Reply, num, text};

    use super::*;
    use crate::test_support::*;

    fn script(h: &Harness) {
        h.driver.on(
            "from dba_tablespaces",
            Reply::rows(
                &[("TABLESPACE_NAME", T), ("CONTENTS", T), ("STATUS", T), ("BLOCK_SIZE", N)],
                vec![
                    vec![text("USERS"), text("PERMANENT"), text("ONLINE"), num(8192.0)],
                    vec![text("TEMP"), text("TEMPORARY"), text("ONLINE"), num(8192.0)],
                    vec![text("EMPTY"), text("PERMANENT"), text("OFFLINE"), num(8192.0)],
                ],
            ),
        );
        h.driver.on(
            "from dba_data_files",
            Reply::rows(
                &[("TABLESPACE_NAME", T), ("SPACE_TOTAL", N), ("SPACE_EXTENSIBLE", N)],
                vec![
                    vec![text("USERS"), num(1000.0), num(3000.0)],
                    vec![text("TEMP"), num(819200.0), num(0.0)],
                ],
            ),
        );
        h.driver.on(
            "from v$sort_segment",
            Reply::rows(&[("TABLESPACE_NAME", T), ("USED", N)], vec![vec![text("TEMP"), num(10.0)]]),
        );
        h.driver.on(
            "from dba_recyclebin",
            Reply::rows(&[("TS_NAME", T), ("SPACE", N)], vec![vec![text("USERS"), num(2.0)]]),
        );
    }

    fn value(samples: &[oramon_metrics::Sample], ts: &str, mode: &str) -> f64 {
        find(samples, "oracle_tablespace_stat", &[("tablespace_name", ts), ("mode", mode)]).value
    }

    #[tokio::test]
    async fn computes_usage_modes() {
        let h = Harness::new(&[]);
        script(&h);
        h.driver.on(
            "from dba_free_space_nonrecyclebin",
            Reply::rows(&[("TABLESPACE_NAME", T), ("SPACE_FREE", N)], vec![vec![text("USERS"), num(250.0)]]),
        );
        let scraper = TablespaceScraper::new(&h.registry).unwrap();
        let samples = h.run(&scraper, root19()).await.unwrap();

        assert_eq!(value(&samples, "USERS", "total"), 1000.0);
        assert_eq!(value(&samples, "USERS", "free"), 250.0);
        assert_eq!(value(&samples, "USERS", "used"), 750.0);
        assert_eq!(value(&samples, "USERS", "used_pct"), 75.0);
        assert_eq!(value(&samples, "USERS", "used_pct_ext"), 18.75);
        assert_eq!(value(&samples, "USERS", "recyclebin_used"), 16384.0);

        assert_eq!(value(&samples, "TEMP", "used"), 81920.0);
        assert_eq!(value(&samples, "TEMP", "free"), 819200.0 - 81920.0);
        assert_eq!(value(&samples, "TEMP", "used_pct"), 10.0);

        // No files: zero denominators report 0 rather than NaN.
        assert_eq!(value(&samples, "EMPTY", "used_pct"), 0.0);
        assert_eq!(value(&samples, "EMPTY", "used_pct_ext"), 0.0);
        assert_eq!(samples.len(), 3 * 7);
    }

    #[tokio::test]
    async fn falls_back_when_nonrecyclebin_view_is_missing() {
        let h = Harness::new(&[]);
        script(&h);
        h.driver.on(
            "from dba_free_space_nonrecyclebin",
            Reply::error("ORA-00942: table or view does not exist"),
        );
        h.driver.on(
            "from dba_free_space ",
            Reply::rows(&[("TABLESPACE_NAME", T), ("SPACE_FREE", N)], vec![vec![text("USERS"), num(100.0)]]),
        );
        let scraper = TablespaceScraper::new(&h.registry).unwrap();
        let samples = h.run(&scraper, root19()).await.unwrap();

        assert_eq!(value(&samples, "USERS", "free"), 100.0);
        assert_eq!(h.driver.query_count("from dba_free_space "), 1);
    }

    #[tokio::test]
    async fn other_free_space_errors_fail_the_task() {
        let h = Harness::new(&[]);
        script(&h);
        h.driver.on(
            "from dba_free_space_nonrecyclebin",
            Reply::error("ORA-01555: snapshot too old"),
        );
        let scraper = TablespaceScraper::new(&h.registry).unwrap();
        assert!(h.run(&scraper, root19()).await.is_err());
        assert_eq!(h.driver.query_count("from dba_free_space "), 0);
    }
}
