//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Binary entrypoint for the virtual asset simulator daemon."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vasset_common::config::{AppConfig, PublisherConfig, PublisherKind};
use vasset_common::logging::{init_tracing, LogFormat};
use vasset_core::{ChannelPublisher, JsonLinesPublisher, LogPublisher, Publisher, SimulationService};
use vasset_rt::RunContext;

#[derive(Debug, Parser)]
#[command(author, version, about = "Virtual asset simulator daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, help = "Override the stdout log format")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the simulator until interrupted")]
    Run,
    #[command(about = "Validate the configuration and exit")]
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/example.toml"));

    let loaded = AppConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::CheckConfig => {
            println!(
                "{}: ok ({} assets, publisher {:?})",
                loaded.source.display(),
                config.assets.len(),
                config.publisher.kind
            );
        }
        Commands::Run => {
            init_tracing("vassetd", &config.logging)?;
            info!(config_path = %loaded.source.display(), assets = config.assets.len(), "configuration loaded");
            run_daemon(config).await?;
        }
    }

    Ok(())
}

async fn run_daemon(config: AppConfig) -> Result<()> {
    let (publisher, consumer) = build_publisher(&config.publisher).await?;
    info!(publisher = publisher.name(), "publisher ready");

    let service = match config.simulation.seed {
        Some(seed) => SimulationService::with_seed(publisher, seed),
        None => SimulationService::new(publisher),
    };
    let ctx = RunContext::new();
    let report = service.start_from_configurations(&ctx, &config.assets);
    for skipped in &report.skipped {
        warn!(asset_id = %skipped.asset_id, reason = %skipped.reason, "asset not started");
    }
    for asset in service.configurations() {
        debug!(
            asset_id = %asset.asset_id,
            asset_type = %asset.asset_type,
            interval_ms = asset.measurement_interval.as_millis() as u64,
            "asset active"
        );
    }

    info!(started = report.started, "daemon running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");
    ctx.cancel();
    service.shutdown().await;
    drop(service);

    if let Some(consumer) = consumer {
        let received = consumer.await.context("measurement consumer failed")?;
        info!(received, "measurement consumer drained");
    }
    Ok(())
}

async fn build_publisher(
    config: &PublisherConfig,
) -> Result<(Arc<dyn Publisher>, Option<JoinHandle<u64>>)> {
    match config.kind {
        PublisherKind::Log => Ok((Arc::new(LogPublisher), None)),
        PublisherKind::JsonLines => {
            let path = config
                .path
                .as_ref()
                .context("publisher kind 'json-lines' requires a path")?;
            let publisher = JsonLinesPublisher::open(path)
                .await
                .with_context(|| format!("unable to open {}", path.display()))?;
            Ok((Arc::new(publisher), None))
        }
        PublisherKind::Channel => {
            let (publisher, mut rx) = ChannelPublisher::new(config.channel_capacity);
            let consumer = tokio::spawn(async move {
                let mut received = 0u64;
                while let Some(envelope) = rx.recv().await {
                    received += 1;
                    debug!(
                        asset_id = %envelope.asset_id,
                        power_w = envelope.measurement.power.value,
                        state_of_energy = envelope.measurement.state_of_energy,
                        "measurement received"
                    );
                }
                received
            });
            Ok((Arc::new(publisher), Some(consumer)))
        }
    }
}
