//! Longest-running active sessions and blocking chains.

use std::sync::Arc;

use async_trait::async_trait;
use oramon_db::Row;
use oramon_metrics::{Desc, MetricKind, MetricRegistry, MetricResult};

use crate::error::CollectResult;
use crate::scraper::{ScrapeContext, Scraper};

const ACTIVE_LABELS: &[&str] = &[
    "sid",
    "serial",
    "username",
    "sql_id",
    "sql_child_number",
    "program",
    "machine",
    "event",
    "sql_text",
    "con_id",
    "con_name",
];

const BLOCKING_LABELS: &[&str] = &[
    "sid",
    "serial",
    "logon_time",
    "status",
    "event",
    "p1",
    "p2",
    "p3",
    "username",
    "terminal",
    "program",
    "sql_id",
    "prev_sql_id",
    "blocking_session",
    "blocking_instance",
    "row_wait_obj",
    "sql_text",
    "prev_sql_text",
    "con_id",
    "con_name",
];

/// Column positions feeding `BLOCKING_LABELS`, minus the trailing con_name.
const BLOCKING_COLUMNS: &[usize] = &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 18, 19, 17];

fn active_sql(con_id: &str) -> String {
    format!(
        "select * from (
select last_call_et, a.sid, a.serial#, a.username, a.sql_id, a.sql_child_number,
  a.program, a.machine, a.event, b.sql_text, {con_id}
from v$session a, v$sql b
where a.status = 'ACTIVE'
  and a.sql_id = b.sql_id
  and a.sql_child_number = b.child_number
  and rawtohex(a.sql_address) <> '00'
  and a.username is not null
  and a.type <> 'BACKGROUND'
  and a.sid <> (select sid from v$mystat where rownum = 1)
order by last_call_et desc) where rownum <= 30"
    )
}

fn blocking_sql(con_id: &str) -> String {
    format!(
        "with sessions as (
select last_call_et, sid, serial# serial, to_char(logon_time, 'yyyy-mm-dd hh24:mi:ss') as logon_time,
  status, event, p1, p2, p3, username, terminal, program, sql_id, prev_sql_id,
  blocking_session, blocking_instance, row_wait_obj# row_wait_obj, {con_id}
from v$session)
select a.*, b.sql_text, c.sql_text as prev_sql_text
from sessions a
left join v$sql b on a.sql_id = b.sql_id and b.child_number = 0
left join v$sql c on a.prev_sql_id = c.sql_id and c.child_number = 0
where a.sid in (select blocking_session from sessions)
   or a.blocking_session is not null"
    )
}

pub struct SessionScraper {
    active: Arc<Desc>,
    blocking: Arc<Desc>,
}

impl SessionScraper {
    pub fn new(registry: &MetricRegistry) -> MetricResult<Self> {
        Ok(Self {
            active: registry.describe("session", "active", "Oracle Active Session", ACTIVE_LABELS, MetricKind::Gauge)?,
            blocking: registry.describe(
                "session",
                "blocking",
                "Oracle Blocking Session",
                BLOCKING_LABELS,
                MetricKind::Gauge,
            )?,
        })
    }
}

fn labels_at(r: &Row, columns: impl IntoIterator<Item = usize>, con_name: String) -> CollectResult<Vec<String>> {
    let mut labels = columns.into_iter().map(|i| r.label(i)).collect::<Result<Vec<_>, _>>()?;
    labels.push(con_name);
    Ok(labels)
}

#[async_trait]
impl Scraper for SessionScraper {
    fn name(&self) -> &'static str {
        "session"
    }

    fn help(&self) -> &'static str {
        "collect active and blocking sessions from v$session"
    }

    async fn scrape(&self, ctx: &ScrapeContext) -> CollectResult<()> {
        let (active_con, blocking_con) = if ctx.legacy() {
            ("0 as con_id", "0 as con_id")
        } else {
            ("a.con_id", "con_id")
        };

        for r in ctx.fetch(&active_sql(active_con), &[]).await? {
            let labels = labels_at(&r, 1..=10, ctx.info().con_name())?;
            ctx.emit(&self.active, r.number(0)?, labels)?;
        }
        for r in ctx.fetch(&blocking_sql(blocking_con), &[]).await? {
            let labels = labels_at(&r, BLOCKING_COLUMNS.iter().copied(), ctx.info().con_name())?;
            ctx.emit(&self.blocking, r.number(0)?, labels)?;
        }
        Ok(())
    }
}
