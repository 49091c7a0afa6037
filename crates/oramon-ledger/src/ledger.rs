//! Ledger state and its on-disk form.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{LedgerError, LedgerResult};

/// Convert any `Display` error into a `LedgerError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| LedgerError::$variant(e.to_string())
    };
}

/// Seconds since the Unix epoch, as stored in ledger markers.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Identity of one AWR snapshot: database, RAC instance and snapshot id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub dbid: String,
    pub instance_number: String,
    pub snap_id: String,
}

impl SnapshotKey {
    pub fn new(
        dbid: impl Into<String>,
        instance_number: impl Into<String>,
        snap_id: impl Into<String>,
    ) -> Self {
        Self {
            dbid: dbid.into(),
            instance_number: instance_number.into(),
            snap_id: snap_id.into(),
        }
    }

    /// Flat key under which the snapshot is stored.
    pub fn ledger_key(&self) -> String {
        format!("{}-{}-{}", self.dbid, self.instance_number, self.snap_id)
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ledger_key())
    }
}

/// In-memory set of processed snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    entries: BTreeMap<String, String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw key → marker view.
    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn processed(&self, key: &SnapshotKey) -> bool {
        self.entries.contains_key(&key.ledger_key())
    }

    /// Record `key` as processed, stamped with the current time.
    pub fn mark_processed(&mut self, key: &SnapshotKey) {
        self.mark_processed_at(key, unix_now());
    }

    pub fn mark_processed_at(&mut self, key: &SnapshotKey, epoch_secs: u64) {
        self.entries.insert(key.ledger_key(), epoch_secs.to_string());
    }

    /// Drop entries stamped more than `retention` before `now` (epoch
    /// seconds). Markers that are not epoch seconds are left alone.
    /// Returns the number of entries removed.
    pub fn compact(&mut self, now: u64, retention: Duration) -> usize {
        let horizon = now.saturating_sub(retention.as_secs());
        let before = self.entries.len();
        self.entries.retain(|_, marker| match marker.parse::<u64>() {
            Ok(stamp) => stamp >= horizon,
            Err(_) => true,
        });
        before - self.entries.len()
    }
}

/// The JSON file a [`Ledger`] is persisted to.
#[derive(Debug, Clone)]
pub struct LedgerFile {
    path: PathBuf,
}

impl LedgerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the ledger. A missing or unreadable file yields an empty ledger
    /// and a warning; every snapshot in the lookback window is then
    /// treated as new.
    pub fn load(&self) -> Ledger {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "ledger not readable, starting empty");
                return Ledger::new();
            }
        };
        let object: Map<String, Value> = match serde_json::from_str(&content) {
            Ok(object) => object,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "ledger malformed, starting empty");
                return Ledger::new();
            }
        };

        // Older ledgers may carry non-string markers; keep them as text.
        let entries = object
            .into_iter()
            .map(|(key, marker)| match marker {
                Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect::<BTreeMap<_, _>>();
        debug!(path = ?self.path, entries = entries.len(), "ledger loaded");
        Ledger { entries }
    }

    /// Rewrite the whole file. The new content is written to a sibling
    /// temp file and renamed over the old one.
    pub fn save(&self, ledger: &Ledger) -> LedgerResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(map_err!(CreateDir))?;
        }
        let body = serde_json::to_vec_pretty(&ledger.entries).map_err(map_err!(Serialize))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, body).map_err(map_err!(Write))?;
        fs::rename(&tmp, &self.path).map_err(map_err!(Rename))?;
        debug!(path = ?self.path, entries = ledger.len(), "ledger saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(snap: &str) -> SnapshotKey {
        SnapshotKey::new("1234567890", "1", snap)
    }

    #[test]
    fn ledger_key_joins_components() {
        assert_eq!(key("4711").ledger_key(), "1234567890-1-4711");
        assert_eq!(key("4711").to_string(), "1234567890-1-4711");
    }

    #[test]
    fn processed_flips_after_mark() {
        let mut ledger = Ledger::new();
        assert!(!ledger.processed(&key("1")));
        ledger.mark_processed(&key("1"));
        assert!(ledger.processed(&key("1")));
        assert!(!ledger.processed(&key("2")));
    }

    #[test]
    fn processed_survives_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = LedgerFile::new(dir.path().join("context.json"));

        let mut ledger = file.load();
        assert!(!ledger.processed(&key("10")));
        ledger.mark_processed(&key("10"));
        file.save(&ledger).unwrap();

        let reloaded = file.load();
        assert!(reloaded.processed(&key("10")));
        assert_eq!(reloaded, ledger);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = LedgerFile::new(dir.path().join("absent.json"));
        assert!(file.load().is_empty());
    }

    #[test]
    fn malformed_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");
        fs::write(&path, "{not json").unwrap();
        assert!(LedgerFile::new(&path).load().is_empty());
    }

    #[test]
    fn legacy_markers_are_kept_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");
        fs::write(&path, r#"{"1-1-7":"done","1-1-8":42}"#).unwrap();
        let ledger = LedgerFile::new(&path).load();
        assert_eq!(ledger.entries()["1-1-7"], "done");
        assert_eq!(ledger.entries()["1-1-8"], "42");
    }

    #[test]
    fn save_creates_parent_dirs_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("context.json");
        let file = LedgerFile::new(&path);
        let mut ledger = Ledger::new();
        ledger.mark_processed(&key("3"));
        file.save(&ledger).unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("state").join("context.json.tmp").exists());
    }

    #[test]
    fn compact_drops_only_expired_stamps() {
        let mut ledger = Ledger::new();
        ledger.mark_processed_at(&key("old"), 1_000);
        ledger.mark_processed_at(&key("fresh"), 90_000);
        ledger.entries.insert("1-1-legacy".into(), "done".into());

        let removed = ledger.compact(100_000, Duration::from_secs(24 * 3600));
        assert_eq!(removed, 1);
        assert!(!ledger.processed(&key("old")));
        assert!(ledger.processed(&key("fresh")));
        assert!(ledger.entries().contains_key("1-1-legacy"));
    }

    #[test]
    fn compact_with_clock_before_horizon_keeps_everything() {
        let mut ledger = Ledger::new();
        ledger.mark_processed_at(&key("1"), 10);
        assert_eq!(ledger.compact(20, Duration::from_secs(3600)), 0);
        assert_eq!(ledger.len(), 1);
    }
}
