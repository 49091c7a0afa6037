//! Exporter self-metrics.
//!
//! Counters survive across cycles; the connect status and the last-error
//! flag describe the most recent cycle only.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::desc::{Desc, MetricKind, MetricRegistry};
use crate::error::MetricResult;
use crate::sample::Sample;

/// Outcome of the root connect at the start of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectStatus {
    Ok,
    Failed(String),
}

pub struct ExporterStats {
    scrapes_total: AtomicU64,
    last_scrape_error: AtomicBool,
    up: AtomicBool,
    scrape_errors: Mutex<BTreeMap<String, u64>>,
    connect_status: Mutex<Option<ConnectStatus>>,
    descs: StatsDescs,
}

struct StatsDescs {
    scrapes_total: Arc<Desc>,
    scrape_errors_total: Arc<Desc>,
    last_scrape_error: Arc<Desc>,
    up: Arc<Desc>,
    connect_status: Arc<Desc>,
}

impl ExporterStats {
    pub fn new(registry: &MetricRegistry) -> MetricResult<Self> {
        let descs = StatsDescs {
            scrapes_total: registry.describe(
                "exporter",
                "scrapes_total",
                "Total number of times Oracle was scraped for metrics.",
                &[],
                MetricKind::Counter,
            )?,
            scrape_errors_total: registry.describe(
                "exporter",
                "scrape_errors_total",
                "Total number of times an error occurred scraping Oracle.",
                &["collector"],
                MetricKind::Counter,
            )?,
            last_scrape_error: registry.describe(
                "exporter",
                "last_scrape_error",
                "Whether the last scrape of metrics from Oracle resulted in an error (1 for error, 0 for success).",
                &[],
                MetricKind::Gauge,
            )?,
            up: registry.describe("", "up", "Whether the Oracle database server is up.", &[], MetricKind::Gauge)?,
            connect_status: registry.describe(
                "exporter",
                "db_connect_status",
                "Whether the exporter could connect to the database (0 for OK, 1 for failure).",
                &["message"],
                MetricKind::Gauge,
            )?,
        };
        Ok(Self {
            scrapes_total: AtomicU64::new(0),
            last_scrape_error: AtomicBool::new(false),
            up: AtomicBool::new(false),
            scrape_errors: Mutex::new(BTreeMap::new()),
            connect_status: Mutex::new(None),
            descs,
        })
    }

    /// Start a cycle: bump the counter and clear the per-cycle error flag.
    pub fn begin_cycle(&self) {
        self.scrapes_total.fetch_add(1, Ordering::Relaxed);
        self.last_scrape_error.store(false, Ordering::Relaxed);
    }

    pub fn record_connect(&self, status: ConnectStatus) {
        let ok = status == ConnectStatus::Ok;
        self.up.store(ok, Ordering::Relaxed);
        if !ok {
            self.last_scrape_error.store(true, Ordering::Relaxed);
        }
        *self.connect_status.lock().unwrap_or_else(PoisonError::into_inner) = Some(status);
    }

    /// Count one failed collection task.
    pub fn record_collector_error(&self, collector: &str) {
        *self
            .scrape_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(collector.to_string())
            .or_insert(0) += 1;
        self.last_scrape_error.store(true, Ordering::Relaxed);
    }

    /// Flag the cycle as failed without attributing it to a collector.
    pub fn record_cycle_error(&self) {
        self.last_scrape_error.store(true, Ordering::Relaxed);
    }

    pub fn scrapes_total(&self) -> u64 {
        self.scrapes_total.load(Ordering::Relaxed)
    }

    pub fn collector_errors(&self, collector: &str) -> u64 {
        self.scrape_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collector)
            .copied()
            .unwrap_or(0)
    }

    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::Relaxed)
    }

    /// Current values as samples.
    pub fn samples(&self) -> MetricResult<Vec<Sample>> {
        let d = &self.descs;
        let mut out = Vec::new();
        if let Some(status) = self.connect_status.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            let (message, value) = match status {
                ConnectStatus::Ok => ("OK".to_string(), 0.0),
                ConnectStatus::Failed(message) => (message, 1.0),
            };
            out.push(Sample::new(&d.connect_status, value, vec![message])?);
        }
        out.push(Sample::new(&d.scrapes_total, self.scrapes_total() as f64, vec![])?);
        for (collector, count) in self.scrape_errors.lock().unwrap_or_else(PoisonError::into_inner).iter() {
            out.push(Sample::new(&d.scrape_errors_total, *count as f64, vec![collector.clone()])?);
        }
        let last_error = if self.last_scrape_error.load(Ordering::Relaxed) { 1.0 } else { 0.0 };
        out.push(Sample::new(&d.last_scrape_error, last_error, vec![])?);
        out.push(Sample::new(&d.up, if self.is_up() { 1.0 } else { 0.0 }, vec![])?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(samples: &[Sample], name: &str) -> Option<f64> {
        samples.iter().find(|s| s.name() == name).map(|s| s.value)
    }

    #[test]
    fn successful_cycle() {
        let stats = ExporterStats::new(&MetricRegistry::new()).unwrap();
        stats.begin_cycle();
        stats.record_connect(ConnectStatus::Ok);
        let samples = stats.samples().unwrap();

        let status = samples
            .iter()
            .find(|s| s.name() == "oracle_exporter_db_connect_status")
            .unwrap();
        assert_eq!(status.label("message"), Some("OK"));
        assert_eq!(status.value, 0.0);
        assert_eq!(value(&samples, "oracle_up"), Some(1.0));
        assert_eq!(value(&samples, "oracle_exporter_scrapes_total"), Some(1.0));
        assert_eq!(value(&samples, "oracle_exporter_last_scrape_error"), Some(0.0));
    }

    #[test]
    fn failed_connect_sets_error_flags() {
        let stats = ExporterStats::new(&MetricRegistry::new()).unwrap();
        stats.begin_cycle();
        stats.record_connect(ConnectStatus::Failed("ORA-12541: TNS:no listener".into()));
        let samples = stats.samples().unwrap();

        let status = samples
            .iter()
            .find(|s| s.name() == "oracle_exporter_db_connect_status")
            .unwrap();
        assert_eq!(status.label("message"), Some("ORA-12541: TNS:no listener"));
        assert_eq!(status.value, 1.0);
        assert_eq!(value(&samples, "oracle_up"), Some(0.0));
        assert_eq!(value(&samples, "oracle_exporter_last_scrape_error"), Some(1.0));
    }

    #[test]
    fn collector_errors_accumulate_and_error_flag_resets() {
        let stats = ExporterStats::new(&MetricRegistry::new()).unwrap();
        stats.begin_cycle();
        stats.record_collector_error("tablespace");
        stats.record_collector_error("tablespace");
        assert_eq!(stats.collector_errors("tablespace"), 2);
        assert_eq!(stats.collector_errors("asm"), 0);

        stats.begin_cycle();
        let samples = stats.samples().unwrap();
        assert_eq!(value(&samples, "oracle_exporter_last_scrape_error"), Some(0.0));
        assert_eq!(value(&samples, "oracle_exporter_scrape_errors_total"), Some(2.0));
        assert_eq!(stats.scrapes_total(), 2);
    }
}
