//! Fast recovery area usage.

use std::sync::Arc;

use async_trait::async_trait;
use oramon_metrics::{Desc, MetricKind, MetricRegistry, MetricResult};

use crate::error::CollectResult;
use crate::scraper::{ScrapeContext, Scraper, percent};

const RECOVERY_SQL: &str = "select substr(name, 1, 64) as name, space_limit, space_used, space_reclaimable, number_of_files
from v$recovery_file_dest
where space_limit > 0";

pub struct RecoveryAreaScraper {
    desc: Arc<Desc>,
}

impl RecoveryAreaScraper {
    pub fn new(registry: &MetricRegistry) -> MetricResult<Self> {
        Ok(Self {
            desc: registry.describe(
                "recovery_area",
                "stat",
                "Oracle Recovery Area Stats",
                &["name", "mode"],
                MetricKind::Gauge,
            )?,
        })
    }
}

#[async_trait]
impl Scraper for RecoveryAreaScraper {
    fn name(&self) -> &'static str {
        "recovery_area"
    }

    fn help(&self) -> &'static str {
        "collect recovery area usage from v$recovery_file_dest"
    }

    fn root_only(&self) -> bool {
        true
    }

    async fn scrape(&self, ctx: &ScrapeContext) -> CollectResult<()> {
        for r in ctx.fetch(RECOVERY_SQL, &[]).await? {
            let name = r.label(0)?;
            let limit = r.number(1)?;
            let used = r.number(2)?;
            let modes = [
                ("total", limit),
                ("used", used),
                ("reclaimable", r.number(3)?),
                ("number_of_files", r.number(4)?),
                ("used_pct", percent(used, limit)),
            ];
            for (mode, value) in modes {
                ctx.emit(&self.desc, value, vec![name.clone(), mode.to_string()])?;
            }
        }
        Ok(())
    }
}
