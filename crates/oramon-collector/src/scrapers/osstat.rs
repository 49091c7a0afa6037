//! Operating system statistics from `v$osstat`.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use oramon_metrics::{Desc, MetricKind, MetricRegistry, MetricResult};
use regex::Regex;

use crate::error::CollectResult;
use crate::scraper::{ScrapeContext, Scraper, placeholders, text_params};

pub const STATISTICS: &[&str] = &[
    "NUM_CPUS",
    "IDLE_TIME",
    "BUSY_TIME",
    "USER_TIME",
    "SYS_TIME",
    "IOWAIT_TIME",
    "NICE_TIME",
    "LOAD",
    "PHYSICAL_MEMORY_BYTES",
    "NUM_CPU_CORES",
    "NUM_CPU_SOCKETS",
];

// Literal pattern; a failure here is a programming error.
static CPU_MODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\w+)_time$").expect("cpu mode pattern"));

const HELP: &str = "Metric from v$osstat";

pub struct OsStatScraper {
    cpu_total: Arc<Desc>,
}

impl OsStatScraper {
    pub fn new(registry: &MetricRegistry) -> MetricResult<Self> {
        Ok(Self {
            cpu_total: registry.describe(
                "osstat",
                "cpu_total",
                "Oracle OS Stats Cpu Total",
                &["mode"],
                MetricKind::Counter,
            )?,
        })
    }
}

#[async_trait]
impl Scraper for OsStatScraper {
    fn name(&self) -> &'static str {
        "osstat"
    }

    fn help(&self) -> &'static str {
        "collect host cpu and memory stats from v$osstat"
    }

    fn root_only(&self) -> bool {
        true
    }

    async fn scrape(&self, ctx: &ScrapeContext) -> CollectResult<()> {
        let sql = format!(
            "select lower(stat_name) as stat_name, value from v$osstat where stat_name in ({})",
            placeholders(STATISTICS.len())
        );
        for r in ctx.fetch(&sql, &text_params(STATISTICS)).await? {
            let name = r.text(0)?;
            let value = r.number(1)?;
            match CPU_MODE.captures(name) {
                Some(caps) => ctx.emit(&self.cpu_total, value, vec![caps[1].to_string()])?,
                None => {
                    let desc = ctx.describe("osstat", name, HELP, &[], MetricKind::Gauge)?;
                    ctx.emit(&desc, value, Vec::new())?;
                }
            }
        }
        Ok(())
    }
}
