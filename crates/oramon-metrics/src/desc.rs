//! Metric descriptors and the registry they live in.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{MetricError, MetricResult};

/// Namespace every exported family lives under.
pub const NAMESPACE: &str = "oracle";

/// Prometheus value kind of a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Counter,
    Gauge,
    Untyped,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Untyped => "untyped",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join the non-empty parts of a metric name with `_`.
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// Static description of one metric family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Desc {
    pub fq_name: String,
    pub help: String,
    pub label_names: Vec<String>,
    pub kind: MetricKind,
}

impl Desc {
    pub fn new(fq_name: impl Into<String>, help: impl Into<String>, labels: &[&str], kind: MetricKind) -> Self {
        Self {
            fq_name: fq_name.into(),
            help: help.into(),
            label_names: labels.iter().map(|l| l.to_string()).collect(),
            kind,
        }
    }
}

/// Descriptors keyed by fully-qualified name.
///
/// Built once when the exporter starts and shared with every collection
/// task. Families whose names depend on query results (one per statistic
/// row) are added on first use through the same [`describe`](Self::describe)
/// call, which hands back the existing descriptor on later calls.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    descs: Mutex<BTreeMap<String, Arc<Desc>>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `oracle_<subsystem>_<name>` or return the descriptor
    /// already registered under that name. Re-registering with different
    /// labels or kind is an error.
    pub fn describe(
        &self,
        subsystem: &str,
        name: &str,
        help: &str,
        labels: &[&str],
        kind: MetricKind,
    ) -> MetricResult<Arc<Desc>> {
        let desc = Desc::new(build_fq_name(NAMESPACE, subsystem, name), help, labels, kind);
        let mut descs = self.descs.lock().unwrap_or_else(PoisonError::into_inner);
        match descs.get(&desc.fq_name) {
            Some(existing) if existing.label_names == desc.label_names && existing.kind == desc.kind => {
                Ok(Arc::clone(existing))
            }
            Some(_) => Err(MetricError::Conflict(desc.fq_name)),
            None => {
                let desc = Arc::new(desc);
                descs.insert(desc.fq_name.clone(), Arc::clone(&desc));
                Ok(desc)
            }
        }
    }

    pub fn get(&self, fq_name: &str) -> Option<Arc<Desc>> {
        self.descs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(fq_name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.descs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fq_name_skips_empty_parts() {
        assert_eq!(build_fq_name("oracle", "stat", "sessions_total"), "oracle_stat_sessions_total");
        assert_eq!(build_fq_name("oracle", "", "up"), "oracle_up");
    }

    #[test]
    fn describe_returns_same_descriptor_twice() {
        let registry = MetricRegistry::new();
        let a = registry
            .describe("wait", "total_time", "help", &["wait_class", "event"], MetricKind::Counter)
            .unwrap();
        let b = registry
            .describe("wait", "total_time", "help", &["wait_class", "event"], MetricKind::Counter)
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("oracle_wait_total_time").unwrap().kind, MetricKind::Counter);
    }

    #[test]
    fn describe_rejects_shape_change() {
        let registry = MetricRegistry::new();
        registry.describe("", "up", "help", &[], MetricKind::Gauge).unwrap();
        let err = registry
            .describe("", "up", "help", &["con_id"], MetricKind::Gauge)
            .unwrap_err();
        assert_eq!(err, MetricError::Conflict("oracle_up".into()));
    }
}
