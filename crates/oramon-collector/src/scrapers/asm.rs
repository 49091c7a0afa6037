//! ASM disk group capacity.

use std::sync::Arc;

use async_trait::async_trait;
use oramon_metrics::{Desc, MetricKind, MetricRegistry, MetricResult};

use crate::error::CollectResult;
use crate::scraper::{ScrapeContext, Scraper, percent};

const ASM_SQL: &str = "select name as group_name, state, type, total_mb as space_total, free_mb as space_free,
  total_mb - free_mb as space_used, required_mirror_free_mb, usable_file_mb, offline_disks
from v$asm_diskgroup_stat";

pub struct AsmScraper {
    desc: Arc<Desc>,
}

impl AsmScraper {
    pub fn new(registry: &MetricRegistry) -> MetricResult<Self> {
        Ok(Self {
            desc: registry.describe(
                "asm",
                "diskgroup_stat",
                "Oracle Asm Diskgroup Stats",
                &["group_name", "state", "type", "mode"],
                MetricKind::Gauge,
            )?,
        })
    }
}

#[async_trait]
impl Scraper for AsmScraper {
    fn name(&self) -> &'static str {
        "asm"
    }

    fn help(&self) -> &'static str {
        "collect disk group usage from v$asm_diskgroup_stat"
    }

    async fn scrape(&self, ctx: &ScrapeContext) -> CollectResult<()> {
        for r in ctx.fetch(ASM_SQL, &[]).await? {
            let (group, state, kind) = (r.label(0)?, r.label(1)?, r.label(2)?);
            let total = r.number(3)?;
            let used = r.number(5)?;
            let modes = [
                ("total", total),
                ("free", r.number(4)?),
                ("used", used),
                ("used_pct", percent(used, total)),
                ("required_mirror_free", r.number(6)?),
                ("useable_file_mb", r.number(7)?),
                ("offline_disks", r.number(8)?),
            ];
            for (mode, value) in modes {
                let labels = vec![group.clone(), state.clone(), kind.clone(), mode.to_string()];
                ctx.emit(&self.desc, value, labels)?;
            }
        }
        Ok(())
    }
}
