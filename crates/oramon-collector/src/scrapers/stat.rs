//! System statistics, session counts and process counts.

use std::sync::Arc;

use async_trait::async_trait;
use oramon_metrics::{Desc, MetricKind, MetricRegistry, MetricResult, format_label};

use crate::error::CollectResult;
use crate::scraper::{ScrapeContext, Scraper, placeholders, text_params};

/// `v$sysstat` rows exported as `oracle_stat_<name>` counters.
pub const SYSSTAT_NAMES: &[&str] = &[
    "sorts (memory)",
    "sorts (disk)",
    "sorts (rows)",
    "table scans (long tables)",
    "table scans (short tables)",
    "transaction rollbacks",
    "user commits",
    "redo synch time",
    "redo synch writes",
    "user calls",
    "SQL*Net roundtrips to/from client",
    "gc cr blocks served",
    "gc cr blocks received",
    "gc cr block receive time",
    "gc cr block send time",
    "gc current blocks served",
    "gc current blocks received",
    "gc current block receive time",
    "gc current block send time",
    "gcs messages sent",
    "ges messages sent",
    "db block changes",
    "redo writes",
    "physical read total bytes",
    "physical write total bytes",
    "session logical reads",
    "redo size",
    "leaf node splits",
    "branch node splits",
    "parse count (total)",
    "parse count (hard)",
    "parse count (failures)",
    "execute count",
    "bytes sent via SQL*Net to client",
    "bytes received via SQL*Net from client",
];

const CON_LABELS: &[&str] = &["con_id", "con_name"];
const HELP: &str = "Oracle Stats";

const SESSION_COUNTS: &str = "select count(*) as total_sessions,
  sum(case when status = 'ACTIVE' and type = 'USER' then 1 else 0 end) as active_sessions,
  sum(case when taddr is not null and type = 'USER' then 1 else 0 end) as trans_sessions,
  sum(case when blocking_session is not null and type = 'USER' then 1 else 0 end) as blocking_sessions,";

pub struct StatScraper {
    sessions_total: Arc<Desc>,
    sessions_active: Arc<Desc>,
    sessions_with_trans: Arc<Desc>,
    sessions_blocking: Arc<Desc>,
    process_count: Arc<Desc>,
}

impl StatScraper {
    pub fn new(registry: &MetricRegistry) -> MetricResult<Self> {
        for name in SYSSTAT_NAMES {
            registry.describe("stat", &format_label(name), HELP, CON_LABELS, MetricKind::Counter)?;
        }
        let gauge = |subsystem: &str, name: &str| registry.describe(subsystem, name, HELP, CON_LABELS, MetricKind::Gauge);
        Ok(Self {
            sessions_total: gauge("stat_sessions", "total")?,
            sessions_active: gauge("stat_sessions", "active")?,
            sessions_with_trans: gauge("stat_sessions", "with_trans")?,
            sessions_blocking: gauge("stat_sessions", "blocking")?,
            process_count: gauge("stat", "process_count")?,
        })
    }

    async fn sysstat(&self, ctx: &ScrapeContext) -> CollectResult<()> {
        let con_id = if ctx.legacy() { "0 as con_id" } else { "con_id" };
        let sql = format!(
            "select name, value, {con_id} from v$sysstat where name in ({})",
            placeholders(SYSSTAT_NAMES.len())
        );
        let rows = ctx.fetch(&sql, &text_params(SYSSTAT_NAMES)).await?;
        for r in rows {
            let desc = ctx.describe("stat", &format_label(r.text(0)?), HELP, CON_LABELS, MetricKind::Counter)?;
            ctx.emit(&desc, r.number(1)?, vec![r.label(2)?, ctx.info().con_name()])?;
        }
        Ok(())
    }

    async fn sessions(&self, ctx: &ScrapeContext) -> CollectResult<()> {
        let tail = if ctx.legacy() {
            "0 as con_id from v$session"
        } else if ctx.info().tenant_scoped {
            "con_id from v$session where con_id > 0 group by con_id"
        } else {
            "con_id from v$session group by con_id"
        };
        let sql = format!("{SESSION_COUNTS}\n  {tail}");
        for r in ctx.fetch(&sql, &[]).await? {
            let labels = vec![r.label(4)?, ctx.info().con_name()];
            ctx.emit(&self.sessions_total, r.number(0)?, labels.clone())?;
            ctx.emit(&self.sessions_active, r.number(1)?, labels.clone())?;
            ctx.emit(&self.sessions_with_trans, r.number(2)?, labels.clone())?;
            ctx.emit(&self.sessions_blocking, r.number(3)?, labels)?;
        }
        Ok(())
    }

    async fn processes(&self, ctx: &ScrapeContext) -> CollectResult<()> {
        let sql = if ctx.legacy() {
            "select count(*), 0 as con_id from v$process"
        } else if ctx.info().tenant_scoped {
            "select count(*), con_id from v$process where con_id > 0 group by con_id"
        } else {
            "select count(*), con_id from v$process group by con_id"
        };
        for r in ctx.fetch(sql, &[]).await? {
            ctx.emit(&self.process_count, r.number(0)?, vec![r.label(1)?, ctx.info().con_name()])?;
        }
        Ok(())
    }
}

#[async_trait]
impl Scraper for StatScraper {
    fn name(&self) -> &'static str {
        "stat"
    }

    fn help(&self) -> &'static str {
        "collect stats from v$sysstat, v$session, v$process"
    }

    async fn scrape(&self, ctx: &ScrapeContext) -> CollectResult<()> {
        self.sysstat(ctx).await?;
        self.sessions(ctx).await?;
        self.processes(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use oramon_db::Param;
    use oramon_db::testing::{Reply, num, text};

    use super::*;
    use crate::test_support::*;

    fn script(h: &Harness) {
        h.driver.on(
            "from v$sysstat",
            Reply::rows(
                &[("NAME", T), ("VALUE", N), ("CON_ID", N)],
                vec![
                    vec![text("user commits"), num(42.0), num(0.0)],
                    vec![text("SQL*Net roundtrips to/from client"), num(7.0), num(0.0)],
                ],
            ),
        );
        h.driver.on(
            "from v$session",
            Reply::rows(
                &[("TOTAL", N), ("ACTIVE", N), ("TRANS", N), ("BLOCKING", N), ("CON_ID", N)],
                vec![vec![num(50.0), num(5.0), num(2.0), num(1.0), num(1.0)]],
            ),
        );
        h.driver.on(
            "from v$process",
            Reply::rows(&[("COUNT", N), ("CON_ID", N)], vec![vec![num(80.0), num(1.0)]]),
        );
    }

    #[tokio::test]
    async fn emits_sysstat_sessions_and_processes() {
        let h = Harness::new(&[]);
        script(&h);
        let scraper = StatScraper::new(&h.registry).unwrap();
        let samples = h.run(&scraper, root19()).await.unwrap();

        let commits = find(&samples, "oracle_stat_user_commits", &[("con_id", "0")]);
        assert_eq!(commits.value, 42.0);
        assert_eq!(commits.desc.kind, MetricKind::Counter);
        assert_eq!(commits.label("con_name"), Some("CDB$ROOT"));
        find(&samples, "oracle_stat_sqlnet_roundtrips_tofrom_client", &[]);
        assert_eq!(find(&samples, "oracle_stat_sessions_total", &[("con_id", "1")]).value, 50.0);
        assert_eq!(find(&samples, "oracle_stat_sessions_blocking", &[]).value, 1.0);
        assert_eq!(find(&samples, "oracle_stat_process_count", &[]).value, 80.0);
    }

    #[tokio::test]
    async fn names_are_bound_not_inlined() {
        let h = Harness::new(&[]);
        script(&h);
        let scraper = StatScraper::new(&h.registry).unwrap();
        h.run(&scraper, root19()).await.unwrap();

        let q = h
            .driver
            .queries()
            .into_iter()
            .find(|q| q.sql.contains("v$sysstat"))
            .unwrap();
        assert!(!q.sql.contains("user commits"));
        assert!(q.sql.contains(":35"));
        assert_eq!(q.params.len(), SYSSTAT_NAMES.len());
        assert_eq!(q.params[6], Param::Text("user commits".into()));
    }

    #[tokio::test]
    async fn legacy_and_tenant_query_shapes() {
        let h = Harness::new(&[]);
        script(&h);
        let scraper = StatScraper::new(&h.registry).unwrap();
        h.run(&scraper, legacy11()).await.unwrap();
        let sql: Vec<String> = h.driver.queries().into_iter().map(|q| q.sql).collect();
        assert!(sql.iter().all(|s| s.contains("0 as con_id")));

        let h = Harness::new(&[]);
        script(&h);
        let scraper = StatScraper::new(&h.registry).unwrap();
        h.run(&scraper, target_info(crate::Version::new(19, 3), "3", "SALES", true))
            .await
            .unwrap();
        let session_sql = h
            .driver
            .queries()
            .into_iter()
            .find(|q| q.sql.contains("v$session"))
            .unwrap()
            .sql;
        assert!(session_sql.contains("where con_id > 0"));
    }
}
