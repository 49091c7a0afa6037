//! Exporter settings from the `[exporter]` table.
//!
//! ```toml
//! [exporter]
//! listen_address = "0.0.0.0:9161"
//! query_timeout = "10s"
//! snapshot_interval = "10m"
//! ledger_path = "/var/lib/oramon/context.json"
//! disabled_collectors = ["asm"]
//! ```
//!
//! Every key is optional. Durations accept `ms`, `s`, `m` and `h`
//! suffixes; a bare number is seconds.

use std::path::{Path, PathBuf};
use std::time::Duration;

use oramon_db::ConfigError;
use serde::Deserialize;

/// Paths the daemon serves itself; `metrics_path` may not take them.
pub const RESERVED_PATHS: &[&str] = &["/", "/healthz"];

/// Resolved exporter settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExporterConfig {
    pub listen_address: String,
    pub metrics_path: String,
    /// Deadline for each individual query.
    pub query_timeout: Duration,
    /// Minimum time between two AWR snapshot discovery runs.
    pub snapshot_interval: Duration,
    /// Minimum time between two backup set listings, per tenant.
    pub backup_interval: Duration,
    /// How far back snapshot discovery looks.
    pub snapshot_lookback: Duration,
    pub ledger_path: PathBuf,
    /// Ledger entries older than this are dropped before each save.
    pub ledger_retention: Duration,
    pub disabled_collectors: Vec<String>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:9161".to_string(),
            metrics_path: "/metrics".to_string(),
            query_timeout: Duration::from_secs(10),
            snapshot_interval: Duration::from_secs(600),
            backup_interval: Duration::from_secs(600),
            snapshot_lookback: Duration::from_secs(2 * 3600),
            ledger_path: PathBuf::from("context.json"),
            ledger_retention: Duration::from_secs(24 * 3600),
            disabled_collectors: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExporterSection {
    listen_address: Option<String>,
    metrics_path: Option<String>,
    query_timeout: Option<String>,
    snapshot_interval: Option<String>,
    backup_interval: Option<String>,
    snapshot_lookback: Option<String>,
    ledger_path: Option<PathBuf>,
    ledger_retention: Option<String>,
    disabled_collectors: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    exporter: ExporterSection,
}

impl ExporterConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse the `[exporter]` table; a missing table yields the defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let doc: ConfigDocument =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let section = doc.exporter;
        let defaults = Self::default();

        let mut config = Self {
            listen_address: section.listen_address.unwrap_or(defaults.listen_address),
            metrics_path: section.metrics_path.unwrap_or(defaults.metrics_path),
            query_timeout: duration_or("query_timeout", section.query_timeout, defaults.query_timeout)?,
            snapshot_interval: duration_or(
                "snapshot_interval",
                section.snapshot_interval,
                defaults.snapshot_interval,
            )?,
            backup_interval: duration_or("backup_interval", section.backup_interval, defaults.backup_interval)?,
            snapshot_lookback: duration_or(
                "snapshot_lookback",
                section.snapshot_lookback,
                defaults.snapshot_lookback,
            )?,
            ledger_path: section.ledger_path.unwrap_or(defaults.ledger_path),
            ledger_retention: duration_or(
                "ledger_retention",
                section.ledger_retention,
                defaults.ledger_retention,
            )?,
            disabled_collectors: section.disabled_collectors.unwrap_or_default(),
        };

        if !config.metrics_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "metrics_path must start with '/': {}",
                config.metrics_path
            )));
        }
        if RESERVED_PATHS.contains(&config.metrics_path.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "metrics_path {} is reserved",
                config.metrics_path
            )));
        }
        if config.metrics_path.contains(['{', '}', '*']) {
            return Err(ConfigError::Invalid(format!(
                "metrics_path must be a literal path: {}",
                config.metrics_path
            )));
        }
        if config.query_timeout.is_zero() {
            return Err(ConfigError::Invalid("query_timeout must be positive".to_string()));
        }
        // Dropping marks still inside the lookback window would replay them.
        config.ledger_retention = config.ledger_retention.max(config.snapshot_lookback);
        Ok(config)
    }

    pub fn is_enabled(&self, collector: &str) -> bool {
        !self.disabled_collectors.iter().any(|c| c == collector)
    }
}

fn duration_or(key: &str, value: Option<String>, default: Duration) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => parse_duration(&raw)
            .ok_or_else(|| ConfigError::Invalid(format!("{key}: invalid duration {raw:?}"))),
    }
}

/// Parse a duration string like "10s", "500ms", "2m", "2h" or "30".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else if let Some(hours) = s.strip_suffix('h') {
        hours.parse::<u64>().ok().map(|h| Duration::from_secs(h * 3600))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
