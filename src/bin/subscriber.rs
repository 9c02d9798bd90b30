use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use vigia::{
    aggregator::Aggregator,
    api,
    config::SubscriberConfig,
    reporter::ReporterHandle,
    transport, util,
};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Environment file to load before reading configuration
    #[arg(short, long)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    load_env(&args)?;

    util::init_tracing("vigia_subscriber");

    let config = SubscriberConfig::from_env()?;
    debug!(
        "subscriber '{}' connecting to {}:{}, summary every {}s",
        config.subscriber_id, config.mqtt.host, config.mqtt.port, config.summary_interval
    );

    let aggregator = Arc::new(Aggregator::new());

    let (client, eventloop) = transport::connect(&config.subscriber_id, &config.mqtt);

    let shutdown = CancellationToken::new();
    let ingest = tokio::spawn(transport::run_ingest_loop(
        client,
        eventloop,
        aggregator.clone(),
        shutdown.clone(),
    ));

    let reporter = ReporterHandle::spawn(
        aggregator.clone(),
        Duration::from_secs(config.summary_interval),
    );

    if let Some(port) = config.snapshot_port {
        let app = api::snapshot_router(aggregator.clone());
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("failed to bind snapshot port {port}"))?;

        info!("snapshot API listening on port {port}");

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("snapshot API failed: {e}");
            }
        });
    }

    info!("MQTT subscriber started - listening for sensor data...");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("stopping MQTT subscriber...");

    shutdown.cancel();
    let _ = ingest.await;

    // Final summary before exit
    let _ = reporter.report_now().await;
    reporter.shutdown().await;

    info!("MQTT subscriber stopped");
    Ok(())
}

fn load_env(args: &Args) -> anyhow::Result<()> {
    match &args.env_file {
        Some(path) => {
            dotenv::from_path(path)?;
        }
        None => {
            dotenv::dotenv().ok();
        }
    }
    Ok(())
}
