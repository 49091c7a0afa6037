//! Time model statistics.

use std::sync::Arc;

use async_trait::async_trait;
use oramon_metrics::{Desc, MetricKind, MetricRegistry, MetricResult};

use crate::error::CollectResult;
use crate::scraper::{ScrapeContext, Scraper};

const HELP: &str = "Oracle Time Model";

pub struct TimeModelScraper {
    db_time: Arc<Desc>,
    db_cpu: Arc<Desc>,
    background_cpu: Arc<Desc>,
    stat: Arc<Desc>,
}

impl TimeModelScraper {
    pub fn new(registry: &MetricRegistry) -> MetricResult<Self> {
        let con = &["con_id", "con_name"];
        Ok(Self {
            db_time: registry.describe("time_model", "db_time", HELP, con, MetricKind::Counter)?,
            db_cpu: registry.describe("time_model", "db_cpu", HELP, con, MetricKind::Counter)?,
            background_cpu: registry.describe("time_model", "background_cpu", HELP, con, MetricKind::Counter)?,
            stat: registry.describe(
                "time_model",
                "stat",
                HELP,
                &["stat_name", "con_id", "con_name"],
                MetricKind::Counter,
            )?,
        })
    }
}

#[async_trait]
impl Scraper for TimeModelScraper {
    fn name(&self) -> &'static str {
        "time_model"
    }

    fn help(&self) -> &'static str {
        "collect stats from v$sys_time_model"
    }

    async fn scrape(&self, ctx: &ScrapeContext) -> CollectResult<()> {
        let sql = if ctx.legacy() {
            "select stat_name, value, 0 as con_id from v$sys_time_model"
        } else {
            "select stat_name, value, con_id from v$sys_time_model"
        };
        for r in ctx.fetch(sql, &[]).await? {
            let stat_name = r.text(0)?;
            let value = r.number(1)?;
            let con = [r.label(2)?, ctx.info().con_name()];
            let (desc, labels) = match stat_name {
                "DB time" => (&self.db_time, con.to_vec()),
                "DB CPU" => (&self.db_cpu, con.to_vec()),
                "background cpu time" => (&self.background_cpu, con.to_vec()),
                other => {
                    let mut labels = vec![other.to_string()];
                    labels.extend(con);
                    (&self.stat, labels)
                }
            };
            ctx.emit(desc, value, labels)?;
        }
        Ok(())
    }
}
