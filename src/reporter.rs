//! Summary reporter - periodic read-only rendering of the aggregator state
//!
//! Runs as a single background task. On every tick it takes a snapshot and
//! renders a monitoring summary to the log stream; it never mutates the
//! aggregator and never lets a rendering problem escape its own loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::aggregator::{Aggregator, Snapshot};
use crate::util;

/// Commands that can be sent to the [`SummaryReporter`]
#[derive(Debug)]
pub enum ReporterCommand {
    /// Render a summary immediately, bypassing the interval timer
    ReportNow {
        respond_to: oneshot::Sender<()>,
    },

    /// Gracefully shut down the reporter
    Shutdown,
}

/// Actor that renders periodic summaries of the aggregator state
pub struct SummaryReporter {
    aggregator: Arc<Aggregator>,
    command_rx: mpsc::Receiver<ReporterCommand>,
    interval: Duration,
}

impl SummaryReporter {
    pub fn new(
        aggregator: Arc<Aggregator>,
        command_rx: mpsc::Receiver<ReporterCommand>,
        interval: Duration,
    ) -> Self {
        Self {
            aggregator,
            command_rx,
            interval,
        }
    }

    /// Run the reporter's main loop until shutdown.
    pub async fn run(mut self) {
        debug!("starting summary reporter (interval {:?})", self.interval);

        // Wait a full interval before the first summary
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.render();
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        ReporterCommand::ReportNow { respond_to } => {
                            debug!("received ReportNow command");
                            self.render();
                            let _ = respond_to.send(());
                        }

                        ReporterCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("summary reporter stopped");
    }

    fn render(&self) {
        if let Err(e) = render_summary(&self.aggregator.snapshot()) {
            error!("failed to render summary: {e:#}");
        }
    }
}

/// Render one monitoring summary to the log.
///
/// Emits a single "no data" line when nothing has been aggregated yet.
pub fn render_summary(snapshot: &Snapshot) -> Result<()> {
    if snapshot.is_empty() {
        info!("SUMMARY | No data received yet");
        return Ok(());
    }

    info!("{}", "=".repeat(60));
    info!("MONITORING SUMMARY");
    info!(
        "Total messages: Memory={}, CPU={}, Messages={}",
        snapshot.counts.memory, snapshot.counts.cpu, snapshot.counts.messages
    );

    let mut sources: Vec<_> = snapshot.latest_readings.iter().collect();
    sources.sort_by_key(|(sensor_id, _)| sensor_id.as_str());

    for (sensor_id, readings) in sources {
        info!("Sensor: {sensor_id}");

        if let Some(memory) = readings.memory {
            info!(
                "Memory: {:.1}% @ {}",
                memory.value,
                util::readable_time(memory.timestamp)
            );
        }

        if let Some(cpu) = readings.cpu {
            info!(
                "CPU: {:.1}% @ {}",
                cpu.value,
                util::readable_time(cpu.timestamp)
            );
        }
    }

    if let Some(last) = snapshot.messages.last() {
        info!(
            "Last message: {} ({} @ {})",
            last.message,
            last.messenger_id,
            util::readable_time(last.timestamp)
        );
    }

    info!("{}", "=".repeat(60));
    Ok(())
}

/// Handle for controlling a [`SummaryReporter`]
#[derive(Clone)]
pub struct ReporterHandle {
    sender: mpsc::Sender<ReporterCommand>,
}

impl ReporterHandle {
    /// Spawn a new reporter actor and return its handle.
    pub fn spawn(aggregator: Arc<Aggregator>, interval: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = SummaryReporter::new(aggregator, cmd_rx, interval);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Render a summary immediately and wait for it to complete.
    pub async fn report_now(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ReporterCommand::ReportNow { respond_to: tx })
            .await
            .context("failed to send ReportNow command")?;

        rx.await.context("failed to receive report confirmation")?;
        Ok(())
    }

    /// Gracefully shut down the reporter.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(ReporterCommand::Shutdown).await;
    }
}
