//! `oracle_instance_info`: one gauge carrying instance and database
//! attributes as labels, valued with the instance uptime.

use std::sync::Arc;

use async_trait::async_trait;
use oramon_metrics::{Desc, MetricKind, MetricRegistry, MetricResult};

use crate::error::CollectResult;
use crate::scraper::{ScrapeContext, Scraper};

const LABELS: &[&str] = &[
    "instance_number",
    "instance_name",
    "host_name",
    "version",
    "status",
    "parallel",
    "thread",
    "archiver",
    "instance_role",
    "database_status",
    "dbid",
    "db_name",
    "db_unique_name",
    "created",
    "log_mode",
    "open_mode",
    "protection_mode",
    "database_role",
    "platform_name",
    "con_id",
    "con_name",
];

pub struct InstanceInfoScraper {
    info: Arc<Desc>,
}

impl InstanceInfoScraper {
    pub fn new(registry: &MetricRegistry) -> MetricResult<Self> {
        Ok(Self {
            info: registry.describe("instance", "info", "Oracle Instance Info", LABELS, MetricKind::Gauge)?,
        })
    }
}

#[async_trait]
impl Scraper for InstanceInfoScraper {
    fn name(&self) -> &'static str {
        "instance_info"
    }

    fn help(&self) -> &'static str {
        "collect stats from v$database, v$instance"
    }

    fn root_only(&self) -> bool {
        true
    }

    async fn scrape(&self, ctx: &ScrapeContext) -> CollectResult<()> {
        let t = ctx.info();
        let (i, d) = (&t.instance, &t.database);
        let labels = [
            &i.instance_number,
            &i.instance_name,
            &i.host_name,
            &i.version,
            &i.status,
            &i.parallel,
            &i.thread,
            &i.archiver,
            &i.instance_role,
            &i.database_status,
            &d.dbid,
            &d.db_name,
            &d.db_unique_name,
            &d.created,
            &d.log_mode,
            &d.open_mode,
            &d.protection_mode,
            &d.database_role,
            &d.platform_name,
            &t.tenant.con_id,
            &t.tenant.con_name,
        ];
        ctx.emit(&self.info, i.uptime, labels.into_iter().cloned().collect())
    }
}
