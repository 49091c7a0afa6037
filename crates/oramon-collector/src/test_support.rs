//! Shared fixtures for collector tests.

use std::sync::Arc;
use std::time::Duration;

use oramon_db::testing::{Reply, ScriptedDriver, num, text};
use oramon_db::DbClient;
use oramon_metrics::{MetricRegistry, Sample, SampleSink};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::error::CollectResult;
use crate::info::{DatabaseInfo, InstanceInfo, TargetInfo, TenantInfo};
use crate::scraper::{ScrapeContext, Scraper};
use crate::version::Version;

pub const T: &str = "VARCHAR2";
pub const N: &str = "NUMBER";

/// A scripted database plus a client whose config file lists `pdbs`.
pub struct Harness {
    pub driver: ScriptedDriver,
    pub client: Arc<DbClient>,
    pub registry: Arc<MetricRegistry>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(pdbs: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oramon.toml");
        let pdbs = pdbs.iter().map(|p| format!("\"{p}\"")).collect::<Vec<_>>().join(", ");
        std::fs::write(
            &path,
            format!(
                "[database]\nhost = \"db01\"\nport = 1521\nservice_name = \"ORCLCDB\"\n\
                 username = \"c##monitor\"\npassword = \"pw\"\npdbs = [{pdbs}]\n"
            ),
        )
        .unwrap();
        let driver = ScriptedDriver::new();
        let client = Arc::new(DbClient::new(&path, Arc::new(driver.clone())));
        Self {
            driver,
            client,
            registry: Arc::new(MetricRegistry::new()),
            dir,
        }
    }

    /// Connect and run one task against `info`, returning what it emitted.
    pub async fn run(&self, scraper: &dyn Scraper, info: TargetInfo) -> CollectResult<Vec<Sample>> {
        if !self.client.is_connected().await {
            self.client.init().await?;
        }
        let (sink, mut buffer) = SampleSink::channel();
        scraper.scrape(&self.context(info, sink)).await?;
        Ok(buffer.drain())
    }

    /// Like [`Harness::run`], but a failed task still hands back whatever
    /// it committed before failing.
    pub async fn run_committed(&self, scraper: &dyn Scraper, info: TargetInfo) -> (CollectResult<()>, Vec<Sample>) {
        if !self.client.is_connected().await {
            if let Err(e) = self.client.init().await {
                return (Err(e.into()), Vec::new());
            }
        }
        let (sink, mut buffer) = SampleSink::channel();
        let result = scraper.scrape(&self.context(info, sink)).await;
        let samples = match result {
            Ok(()) => buffer.drain(),
            Err(_) => buffer.drain_committed(),
        };
        (result, samples)
    }

    fn context(&self, info: TargetInfo, sink: SampleSink) -> ScrapeContext {
        ScrapeContext::new(
            Arc::clone(&self.client),
            Arc::new(info),
            Arc::clone(&self.registry),
            sink,
            Duration::from_secs(5),
            CancellationToken::new(),
        )
    }
}

/// Answers for the three discovery queries on `tenant` (`None` = root).
pub fn script_target(driver: &ScriptedDriver, tenant: Option<&str>, version: &str, con_id: &str, con_name: &str) {
    let instance = Reply::rows(
        &[
            ("INSTANCE_NUMBER", T),
            ("INSTANCE_NAME", T),
            ("HOST_NAME", T),
            ("VERSION", T),
            ("STATUS", T),
            ("PARALLEL", T),
            ("THREAD#", T),
            ("ARCHIVER", T),
            ("STARTUP_TIME", T),
            ("UPTIME", N),
            ("INSTANCE_ROLE", T),
            ("DATABASE_STATUS", T),
        ],
        vec![vec![
            text("1"),
            text("orcl"),
            text("db01"),
            text(version),
            text("OPEN"),
            text("NO"),
            text("1"),
            text("STARTED"),
            text("2024-01-01 00:00:00"),
            num(3600.0),
            text("PRIMARY_INSTANCE"),
            text("ACTIVE"),
        ]],
    );
    let database = Reply::rows(
        &[
            ("DBID", T),
            ("NAME", T),
            ("DB_UNIQUE_NAME", T),
            ("CREATED", T),
            ("LOG_MODE", T),
            ("OPEN_MODE", T),
            ("PROTECTION_MODE", T),
            ("DATABASE_ROLE", T),
            ("PLATFORM_NAME", T),
        ],
        vec![vec![
            text("1234567890"),
            text("ORCL"),
            text("orcl"),
            text("2023-06-01 10:00:00"),
            text("ARCHIVELOG"),
            text("READ WRITE"),
            text("MAXIMUM PERFORMANCE"),
            text("PRIMARY"),
            text("Linux x86 64-bit"),
        ]],
    );
    let container = Reply::rows(&[("CON_NAME", T), ("CON_ID", T)], vec![vec![text(con_name), text(con_id)]]);
    match tenant {
        Some(t) => {
            driver.on_tenant(t, "from v$instance", instance);
            driver.on_tenant(t, "from v$database", database);
            driver.on_tenant(t, "sys_context('userenv'", container);
        }
        None => {
            driver.on("from v$instance", instance);
            driver.on("from v$database", database);
            driver.on("sys_context('userenv'", container);
        }
    }
}

/// Target metadata without going through discovery.
pub fn target_info(version: Version, con_id: &str, con_name: &str, tenant_scoped: bool) -> TargetInfo {
    TargetInfo {
        instance: InstanceInfo {
            instance_number: "1".into(),
            instance_name: "orcl".into(),
            host_name: "db01".into(),
            version: version.to_string(),
            status: "OPEN".into(),
            parallel: "NO".into(),
            thread: "1".into(),
            archiver: "STARTED".into(),
            startup_time: "2024-01-01 00:00:00".into(),
            uptime: 3600.0,
            instance_role: "PRIMARY_INSTANCE".into(),
            database_status: "ACTIVE".into(),
            version_num: version,
        },
        database: DatabaseInfo {
            dbid: "1234567890".into(),
            db_name: "ORCL".into(),
            db_unique_name: "orcl".into(),
            created: "2023-06-01 10:00:00".into(),
            log_mode: "ARCHIVELOG".into(),
            open_mode: "READ WRITE".into(),
            protection_mode: "MAXIMUM PERFORMANCE".into(),
            database_role: "PRIMARY".into(),
            platform_name: "Linux x86 64-bit".into(),
        },
        tenant: TenantInfo {
            con_id: con_id.into(),
            con_name: con_name.into(),
        },
        tenant_scoped,
    }
}

pub fn root19() -> TargetInfo {
    target_info(Version::new(19, 3), "1", "CDB$ROOT", false)
}

pub fn legacy11() -> TargetInfo {
    target_info(Version::new(11, 2), "0", "", false)
}

/// Samples named `name`.
pub fn named<'a>(samples: &'a [Sample], name: &str) -> Vec<&'a Sample> {
    samples.iter().filter(|s| s.name() == name).collect()
}

/// The single sample of `name` whose labels include every `(label, value)`.
pub fn find<'a>(samples: &'a [Sample], name: &str, labels: &[(&str, &str)]) -> &'a Sample {
    samples
        .iter()
        .find(|s| s.name() == name && labels.iter().all(|(l, v)| s.label(l) == Some(*v)))
        .unwrap_or_else(|| panic!("no sample {name} with {labels:?}"))
}
