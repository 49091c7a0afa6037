//! The collection tasks.

pub mod asm;
pub mod backup_set;
pub mod instance_info;
pub mod memory;
pub mod osstat;
pub mod parameter;
pub mod recovery_area;
pub mod session;
pub mod sql_snapshot;
pub mod stat;
pub mod tablespace;
pub mod time_model;
pub mod transaction;
pub mod wait_event;

use std::sync::Arc;

use oramon_metrics::MetricRegistry;
use tracing::info;

use crate::config::ExporterConfig;
use crate::error::CollectResult;
use crate::scraper::Scraper;

/// Every built-in task not listed in `disabled_collectors`.
pub fn default_scrapers(registry: &MetricRegistry, config: &ExporterConfig) -> CollectResult<Vec<Arc<dyn Scraper>>> {
    let all: Vec<Arc<dyn Scraper>> = vec![
        Arc::new(instance_info::InstanceInfoScraper::new(registry)?),
        Arc::new(stat::StatScraper::new(registry)?),
        Arc::new(wait_event::WaitEventScraper::new(registry)?),
        Arc::new(time_model::TimeModelScraper::new(registry)?),
        Arc::new(tablespace::TablespaceScraper::new(registry)?),
        Arc::new(session::SessionScraper::new(registry)?),
        Arc::new(transaction::TransactionScraper::new(registry)?),
        Arc::new(parameter::ParameterScraper::new(registry)?),
        Arc::new(osstat::OsStatScraper::new(registry)?),
        Arc::new(memory::MemoryScraper),
        Arc::new(asm::AsmScraper::new(registry)?),
        Arc::new(recovery_area::RecoveryAreaScraper::new(registry)?),
        Arc::new(backup_set::BackupSetScraper::new(registry, config.backup_interval)?),
        Arc::new(sql_snapshot::SqlSnapshotScraper::new(registry, config)?),
    ];

    let (enabled, disabled): (Vec<_>, Vec<_>) = all.into_iter().partition(|s| config.is_enabled(s.name()));
    for scraper in &disabled {
        info!(collector = scraper.name(), "collector disabled");
    }
    Ok(enabled)
}
