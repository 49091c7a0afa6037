//! oramon-collector: the scrape orchestrator and its collection tasks.
//!
//! An [`Exporter`] runs one cycle per metrics request: connect to the root
//! container, read what it is connected to, fan the collection tasks out
//! over that connection, then repeat for every configured tenant.
//!
//! # Architecture
//!
//! ```text
//! Exporter::collect()
//!   └── cycle (serialized)
//!         ├── DbClient::init ──▶ discover() ──▶ TargetInfo
//!         ├── scrape pass: JoinSet ─┬─ Scraper::scrape(ctx) ─▶ SampleSink
//!         │                         ├─ ...
//!         │                         └─ (barrier)
//!         ├── per tenant: reinit_with_tenant ─▶ discover ─▶ scrape pass
//!         └── close_connection
//!
//! sql_snapshot ── IntervalGate ──▶ LedgerFile (oramon-ledger)
//! ```

pub mod config;
pub mod error;
pub mod exporter;
pub mod info;
pub mod scraper;
pub mod scrapers;
pub mod throttle;
pub mod version;

#[cfg(test)]
mod test_support;

pub use config::{ExporterConfig, RESERVED_PATHS, parse_duration};
pub use error::{CollectError, CollectResult, VersionParseError};
pub use exporter::{CycleOutcome, CycleReport, Exporter, PassReport};
pub use info::{DatabaseInfo, InstanceInfo, TargetInfo, TenantInfo, discover};
pub use scraper::{ScrapeContext, Scraper};
pub use scrapers::default_scrapers;
pub use throttle::IntervalGate;
pub use version::Version;
