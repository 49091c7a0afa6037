//! PGA and SGA sizing.

use async_trait::async_trait;
use oramon_metrics::{MetricKind, format_label};

use crate::error::CollectResult;
use crate::scraper::{ScrapeContext, Scraper};

const PGA_SQL: &str = "select name, value from v$pgastat where unit is not null";
const SGA_SQL: &str = "select name, bytes from v$sgainfo";

pub struct MemoryScraper;

impl MemoryScraper {
    async fn report(&self, ctx: &ScrapeContext, sql: &str, subsystem: &str, help: &str) -> CollectResult<()> {
        for r in ctx.fetch(sql, &[]).await? {
            let desc = ctx.describe(subsystem, &format_label(r.text(0)?), help, &[], MetricKind::Gauge)?;
            ctx.emit(&desc, r.number(1)?, Vec::new())?;
        }
        Ok(())
    }
}

#[async_trait]
impl Scraper for MemoryScraper {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn help(&self) -> &'static str {
        "collect memory areas from v$pgastat and v$sgainfo"
    }

    fn root_only(&self) -> bool {
        true
    }

    async fn scrape(&self, ctx: &ScrapeContext) -> CollectResult<()> {
        self.report(ctx, PGA_SQL, "pga", "metric from v$pgastat").await?;
        self.report(ctx, SGA_SQL, "sga", "metric from v$sgainfo").await
    }
}
