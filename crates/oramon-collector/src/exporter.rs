//! Scrape orchestrator: one cycle over the root container and every
//! configured tenant.
//!
//! ```text
//! run_cycle()
//!   ├── init()                      fails → connect_status{message} 1, stop
//!   ├── discover(root)              fails → cycle error, close, stop
//!   ├── scrape_target(root)         JoinSet of tasks, barrier
//!   ├── for tenant in pdbs (root is container "1", version >= 12)
//!   │     reinit_with_tenant ─▶ discover ─▶ scrape_target
//!   │     (any failure skips to the next tenant)
//!   └── close_connection()          always
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use oramon_db::{DbClient, QueryContext};
use oramon_metrics::{ConnectStatus, ExporterStats, MetricRegistry, Sample, SampleSink};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ExporterConfig;
use crate::error::CollectResult;
use crate::info::{TargetInfo, discover};
use crate::scraper::{ScrapeContext, Scraper};
use crate::scrapers::default_scrapers;

/// How far a cycle got.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CycleOutcome {
    #[default]
    Completed,
    /// The root connect failed; nothing was scraped.
    ConnectFailed(String),
    /// Root metadata could not be read; nothing was scraped.
    DiscoveryFailed(String),
}

/// One scrape pass over a single target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// `None` for the root pass.
    pub tenant: Option<String>,
    pub con_name: String,
    /// Tasks that failed on this pass.
    pub failed: Vec<&'static str>,
    pub samples: usize,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub samples: Vec<Sample>,
    pub passes: Vec<PassReport>,
    pub outcome: CycleOutcome,
}

pub struct Exporter {
    client: Arc<DbClient>,
    registry: Arc<MetricRegistry>,
    scrapers: Vec<Arc<dyn Scraper>>,
    stats: ExporterStats,
    config: ExporterConfig,
    cycle: Mutex<()>,
    cancel: CancellationToken,
}

impl Exporter {
    /// Exporter running every built-in task the configuration leaves enabled.
    pub fn new(client: Arc<DbClient>, config: ExporterConfig) -> CollectResult<Self> {
        let registry = Arc::new(MetricRegistry::new());
        let scrapers = default_scrapers(&registry, &config)?;
        Self::with_scrapers(client, config, registry, scrapers)
    }

    /// Exporter running exactly `scrapers`, whose descriptors live in `registry`.
    pub fn with_scrapers(
        client: Arc<DbClient>,
        config: ExporterConfig,
        registry: Arc<MetricRegistry>,
        scrapers: Vec<Arc<dyn Scraper>>,
    ) -> CollectResult<Self> {
        let stats = ExporterStats::new(&registry)?;
        info!(
            collectors = scrapers.len(),
            query_timeout = ?config.query_timeout,
            "exporter ready"
        );
        Ok(Self {
            client,
            registry,
            scrapers,
            stats,
            config,
            cycle: Mutex::new(()),
            cancel: CancellationToken::new(),
        })
    }

    pub fn stats(&self) -> &ExporterStats {
        &self.stats
    }

    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    /// Abort in-flight queries and stop traversing tenants.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Run one cycle. Concurrent callers queue behind the running cycle.
    pub async fn run_cycle(&self) -> CycleReport {
        let _cycle = self.cycle.lock().await;
        self.cycle_locked().await
    }

    /// Run one cycle and append the exporter's own metrics.
    pub async fn collect(&self) -> CollectResult<Vec<Sample>> {
        let _cycle = self.cycle.lock().await;
        let mut samples = self.cycle_locked().await.samples;
        samples.extend(self.stats.samples()?);
        Ok(samples)
    }

    async fn cycle_locked(&self) -> CycleReport {
        let started = Instant::now();
        self.stats.begin_cycle();
        let mut report = CycleReport::default();

        if let Err(e) = self.client.init().await {
            warn!(error = %e, "connect to root failed");
            self.stats.record_connect(ConnectStatus::Failed(e.to_string()));
            report.outcome = CycleOutcome::ConnectFailed(e.to_string());
            return report;
        }
        self.stats.record_connect(ConnectStatus::Ok);

        match discover(&self.client, &self.query_context()).await {
            Ok(root) => {
                self.scrape_target(root.clone(), None, &mut report).await;
                if root.is_container_root() {
                    self.scrape_tenants(&mut report).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "root discovery failed");
                self.stats.record_cycle_error();
                report.outcome = CycleOutcome::DiscoveryFailed(e.to_string());
            }
        }

        if let Err(e) = self.client.close_connection().await {
            warn!(error = %e, "close at cycle end failed");
        }
        debug!(
            passes = report.passes.len(),
            samples = report.samples.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cycle finished"
        );
        report
    }

    async fn scrape_tenants(&self, report: &mut CycleReport) {
        for tenant in self.client.tenants().await {
            if self.cancel.is_cancelled() {
                info!("shutdown requested, skipping remaining tenants");
                break;
            }
            if let Err(e) = self.client.reinit_with_tenant(&tenant).await {
                warn!(tenant = %tenant, error = %e, "connect to tenant failed, skipping");
                self.stats.record_cycle_error();
                continue;
            }
            let mut info = match discover(&self.client, &self.query_context()).await {
                Ok(info) => info,
                Err(e) => {
                    warn!(tenant = %tenant, error = %e, "tenant discovery failed, skipping");
                    self.stats.record_cycle_error();
                    continue;
                }
            };
            info.tenant_scoped = true;
            self.scrape_target(info, Some(tenant), report).await;
        }
    }

    /// Fan the applicable tasks out over the current connection and wait
    /// for all of them. A failed task contributes only what it committed.
    async fn scrape_target(&self, info: TargetInfo, tenant: Option<String>, report: &mut CycleReport) {
        let info = Arc::new(info);
        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();

        for scraper in &self.scrapers {
            if scraper.min_version() > info.version() {
                debug!(
                    collector = scraper.name(),
                    min_version = %scraper.min_version(),
                    version = %info.version(),
                    "collector not supported on this version"
                );
                continue;
            }
            if scraper.root_only() && info.tenant_scoped {
                continue;
            }

            let (sink, mut buffer) = SampleSink::channel();
            let ctx = ScrapeContext::new(
                Arc::clone(&self.client),
                Arc::clone(&info),
                Arc::clone(&self.registry),
                sink,
                self.config.query_timeout,
                self.cancel.child_token(),
            );
            let task = Arc::clone(scraper);
            let handle = tasks.spawn(async move {
                let started = Instant::now();
                let result = task.scrape(&ctx).await;
                let samples = match result {
                    Ok(()) => buffer.drain(),
                    Err(_) => buffer.drain_committed(),
                };
                (task.name(), started.elapsed(), result, samples)
            });
            names.insert(handle.id(), scraper.name());
        }

        let mut pass = PassReport {
            tenant,
            con_name: info.tenant.con_name.clone(),
            failed: Vec::new(),
            samples: 0,
        };
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, (name, elapsed, Ok(()), mut samples))) => {
                    debug!(
                        collector = name,
                        con_name = %pass.con_name,
                        samples = samples.len(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "collector finished"
                    );
                    pass.samples += samples.len();
                    report.samples.append(&mut samples);
                }
                Ok((_, (name, elapsed, Err(e), mut committed))) => {
                    warn!(
                        collector = name,
                        con_name = %pass.con_name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        committed = committed.len(),
                        error = %e,
                        "collector failed"
                    );
                    self.stats.record_collector_error(name);
                    pass.failed.push(name);
                    pass.samples += committed.len();
                    report.samples.append(&mut committed);
                }
                Err(e) => {
                    let name = names.get(&e.id()).copied().unwrap_or("unknown");
                    warn!(collector = name, con_name = %pass.con_name, error = %e, "collector task aborted");
                    self.stats.record_collector_error(name);
                    pass.failed.push(name);
                }
            }
        }
        report.passes.push(pass);
    }

    fn query_context(&self) -> QueryContext {
        QueryContext::with_timeout(self.config.query_timeout).with_cancel(self.cancel.child_token())
    }
}
