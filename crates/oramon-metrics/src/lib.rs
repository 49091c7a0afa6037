//! oramon-metrics: metric model and exposition for the oramon exporter.
//!
//! Collection tasks describe their families once in a [`MetricRegistry`],
//! emit [`Sample`]s into a [`SampleSink`] while they run, and the daemon
//! renders the gathered samples as Prometheus text.
//!
//! # Architecture
//!
//! ```text
//! MetricRegistry ── describe() ──▶ Arc<Desc>
//!
//! collection task ── emit() ──▶ SampleSink ═══▶ SampleBuffer ── drain()
//!                                                      │
//! ExporterStats ── samples() ──────────────────────────┤
//!                                                      ▼
//!                                  render_prometheus() → text/plain
//! ```

pub mod desc;
pub mod error;
pub mod label;
pub mod prometheus;
pub mod sample;
pub mod stats;

pub use desc::{Desc, MetricKind, MetricRegistry, NAMESPACE, build_fq_name};
pub use error::{MetricError, MetricResult};
pub use label::format_label;
pub use prometheus::{CONTENT_TYPE, render_prometheus};
pub use sample::{Sample, SampleBuffer, SampleSink};
pub use stats::{ConnectStatus, ExporterStats};
