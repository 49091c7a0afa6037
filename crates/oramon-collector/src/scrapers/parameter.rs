//! Memory and capacity initialization parameters.

use async_trait::async_trait;
use oramon_metrics::{MetricKind, MetricRegistry, MetricResult};
use tracing::debug;

use crate::error::CollectResult;
use crate::scraper::{ScrapeContext, Scraper, placeholders, text_params};

pub const PARAMETERS: &[&str] = &[
    "sessions",
    "processes",
    "memory_target",
    "memory_max_target",
    "sga_target",
    "sga_max_size",
    "shared_pool_size",
    "db_cache_size",
    "large_pool_size",
    "java_pool_size",
    "streams_pool_size",
];

const HELP: &str = "oracle param";

pub struct ParameterScraper;

impl ParameterScraper {
    pub fn new(registry: &MetricRegistry) -> MetricResult<Self> {
        for name in PARAMETERS {
            registry.describe("param", name, HELP, &[], MetricKind::Untyped)?;
        }
        Ok(Self)
    }
}

#[async_trait]
impl Scraper for ParameterScraper {
    fn name(&self) -> &'static str {
        "parameter"
    }

    fn help(&self) -> &'static str {
        "collect stats from v$parameter"
    }

    fn root_only(&self) -> bool {
        true
    }

    async fn scrape(&self, ctx: &ScrapeContext) -> CollectResult<()> {
        let sql = format!(
            "select name, value from v$parameter where name in ({})",
            placeholders(PARAMETERS.len())
        );
        for r in ctx.fetch(&sql, &text_params(PARAMETERS)).await? {
            let name = r.text(0)?;
            let raw = r.text(1)?;
            let Ok(value) = raw.trim().parse::<f64>() else {
                debug!(parameter = name, value = raw, "can not parse parameter value");
                continue;
            };
            let desc = ctx.describe("param", name, HELP, &[], MetricKind::Untyped)?;
            ctx.emit(&desc, value, Vec::new())?;
        }
        Ok(())
    }
}
