use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use vigia::{
    CPU_TOPIC, CpuEnvelope, MEMORY_TOPIC, MemoryEnvelope,
    config::SensorConfig,
    sampler::HostSampler,
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

    util::init_tracing("vigia_sensor");

    let config = SensorConfig::from_env()?;
    debug!(
        "sensor '{}' publishing every {}s to {}:{}",
        config.sensor_id, config.publish_interval, config.mqtt.host, config.mqtt.port
    );

    let (client, eventloop) = transport::connect(&config.sensor_id, &config.mqtt);

    let shutdown = CancellationToken::new();
    let driver = transport::spawn_publish_driver(eventloop, shutdown.clone());
    let publisher = Publisher::new(client);

    let mut sampler = HostSampler::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(config.publish_interval));

    info!("starting host monitoring");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let memory = sampler.memory_percent();
                let cpu = sampler.cpu_percent().await;

                info!("System RAM: {memory:.1}% | CPU: {cpu:.1}%");

                let envelope = MemoryEnvelope::now(&config.sensor_id, memory);
                if let Err(e) = publisher.publish_json(MEMORY_TOPIC, &envelope).await {
                    error!("failed to publish memory data: {e:#}");
                }

                let envelope = CpuEnvelope::now(&config.sensor_id, cpu);
                if let Err(e) = publisher.publish_json(CPU_TOPIC, &envelope).await {
                    error!("failed to publish cpu data: {e:#}");
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("stopping host monitoring...");
                break;
            }
        }
    }

    shutdown.cancel();
    let _ = driver.await;

    info!("sensor stopped");
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
