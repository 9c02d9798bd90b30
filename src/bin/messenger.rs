use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use vigia::{
    api::{self, MessengerState},
    config::MessengerConfig,
    transport::{self, Publisher},
    util,
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

    util::init_tracing("vigia_messenger");

    let config = MessengerConfig::from_env()?;
    debug!(
        "messenger '{}' publishing to {}:{}",
        config.messenger_id, config.mqtt.host, config.mqtt.port
    );

    let (client, eventloop) = transport::connect(&config.messenger_id, &config.mqtt);

    let shutdown = CancellationToken::new();
    let driver = transport::spawn_publish_driver(eventloop, shutdown.clone());

    let app = api::messenger_router(MessengerState {
        publisher: Publisher::new(client),
        messenger_id: config.messenger_id.clone(),
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .with_context(|| format!("failed to bind port {}", config.http_port))?;

    info!("messaging app listening on port {}", config.http_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("stopping messaging app...");
        })
        .await
        .context("HTTP server failed")?;

    shutdown.cancel();
    let _ = driver.await;

    info!("messaging app stopped");
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
