//! oramond: the oramon daemon.
//!
//! Reads one TOML file holding the `[database]` and `[exporter]` tables
//! and serves the collected metrics over HTTP. Each scrape of the metrics
//! path runs one collection cycle against the database.
//!
//! # Usage
//!
//! ```text
//! oramond --config /etc/oramon/oramon.toml --listen 0.0.0.0:9161
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use oramon_collector::{Exporter, ExporterConfig};
use oramon_db::{DbClient, TargetConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oramond", about = "Oracle database metrics exporter")]
struct Cli {
    /// Configuration file with `[database]` and `[exporter]` tables.
    #[arg(long, default_value = "oramon.toml")]
    config: PathBuf,

    /// Listen address; overrides `exporter.listen_address`.
    #[arg(long)]
    listen: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,oramond=debug,oramon=debug"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    // The database table is re-read on every cycle; validate it once here
    // so a broken file fails at startup instead of on the first scrape.
    TargetConfig::from_file(&cli.config)
        .with_context(|| format!("invalid database config in {}", cli.config.display()))?;
    let config = ExporterConfig::from_file(&cli.config)
        .with_context(|| format!("invalid exporter config in {}", cli.config.display()))?;
    let listen = cli.listen.unwrap_or_else(|| config.listen_address.clone());

    let client = Arc::new(DbClient::new(&cli.config, oramon_db::default_driver()));
    let exporter = Arc::new(Exporter::new(client, config)?);
    let router = oramond::build_router(Arc::clone(&exporter));

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("bind {listen}"))?;
    info!(addr = %listen, metrics_path = %exporter.config().metrics_path, "oramond listening");

    // Graceful shutdown on Ctrl-C.
    let shutdown = Arc::clone(&exporter);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
            shutdown.shutdown();
        })
        .await?;

    info!("oramond stopped");
    Ok(())
}
