//! MQTT transport wiring on top of rumqttc.
//!
//! The broker connection, TLS, reconnect, and QoS machinery are all owned by
//! the client library; this module only builds the options from config,
//! offers a thin JSON publisher, and runs the subscriber's delivery loop
//! that feeds the [`Aggregator`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregator::Aggregator;
use crate::config::MqttConfig;
use crate::{CPU_TOPIC, MEMORY_TOPIC, MESSAGES_TOPIC};

/// Topics the subscriber listens on, all with QoS 1.
pub const SUBSCRIBED_TOPICS: [&str; 3] = [MEMORY_TOPIC, CPU_TOPIC, MESSAGES_TOPIC];

/// Delay before re-polling the event loop after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Build a client/event-loop pair from broker config.
///
/// No network I/O happens until the event loop is polled.
pub fn connect(client_id: &str, config: &MqttConfig) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    if config.use_tls {
        options.set_transport(Transport::tls_with_default_config());
    }

    if let (Some(username), Some(password)) = (config.username.clone(), config.password.clone()) {
        options.set_credentials(username, password);
    }

    AsyncClient::new(options, 50)
}

/// Thin publishing wrapper: JSON-encode an envelope and publish it with
/// at-least-once delivery.
#[derive(Clone)]
pub struct Publisher {
    client: AsyncClient,
}

impl Publisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }

    pub async fn publish_json<T: Serialize>(&self, topic: &str, envelope: &T) -> Result<()> {
        let payload = serde_json::to_vec(envelope).context("failed to encode envelope")?;

        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .with_context(|| format!("publish to {topic} failed"))?;

        Ok(())
    }
}

/// Drive the event loop for a publish-only client.
///
/// rumqttc requires the event loop to be polled even when nothing is
/// subscribed; this task acknowledges broker traffic and logs errors.
pub fn spawn_publish_driver(mut eventloop: EventLoop, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("publish driver cancelled");
                    break;
                }

                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to MQTT broker");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("MQTT poll error: {e} (retrying)");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                },
            }
        }
    })
}

/// Run the subscriber's delivery loop until cancelled.
///
/// Subscriptions are (re-)established on every ConnAck so they survive
/// broker reconnects. Each inbound publish is handed to the aggregator;
/// connection errors update the connectivity flag and the diagnostic log,
/// then the loop backs off and keeps polling.
pub async fn run_ingest_loop(
    client: AsyncClient,
    mut eventloop: EventLoop,
    aggregator: Arc<Aggregator>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("ingest loop cancelled");
                break;
            }

            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("connected to MQTT broker");
                    aggregator.set_connected(true);

                    for topic in SUBSCRIBED_TOPICS {
                        match client.subscribe(topic, QoS::AtLeastOnce).await {
                            Ok(()) => info!("subscribed to {topic} with QoS 1"),
                            Err(e) => {
                                error!("failed to subscribe to {topic}: {e}");
                                aggregator.record_transport_error(&format!(
                                    "subscribe to {topic} failed: {e}"
                                ));
                            }
                        }
                    }
                }

                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    debug!("subscription confirmed - pkid: {}", ack.pkid);
                }

                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    aggregator.ingest(&publish.topic, &publish.payload);
                }

                Ok(Event::Incoming(Packet::Disconnect)) => {
                    warn!("broker requested disconnect");
                    aggregator.set_connected(false);
                }

                Ok(_) => {}

                Err(e) => {
                    warn!("MQTT connection error: {e} (retrying)");
                    aggregator.set_connected(false);
                    aggregator.record_transport_error(&format!("connection error: {e}"));
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            },
        }
    }

    aggregator.set_connected(false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryEnvelope;

    fn local_config() -> MqttConfig {
        MqttConfig {
            host: "127.0.0.1".to_string(),
            port: 1883,
            username: None,
            password: None,
            use_tls: false,
            keep_alive_secs: 30,
        }
    }

    #[tokio::test]
    async fn test_publish_without_broker_is_buffered() {
        // Publishes are queued towards the (unpolled) event loop, so this
        // must succeed without any broker running.
        let (client, _eventloop) = connect("test-publisher", &local_config());
        let publisher = Publisher::new(client);

        let envelope = MemoryEnvelope::now("s1", 42.5);
        publisher
            .publish_json(MEMORY_TOPIC, &envelope)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ingest_loop_records_connection_errors() {
        // Point at a port nothing listens on; the loop should record the
        // failure and stay alive until cancelled.
        let mut config = local_config();
        config.port = 1;

        let (client, eventloop) = connect("test-subscriber", &config);
        let aggregator = Arc::new(Aggregator::new());
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(run_ingest_loop(
            client,
            eventloop,
            aggregator.clone(),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("ingest loop should stop after cancellation")
            .unwrap();

        let snapshot = aggregator.snapshot();
        assert!(!snapshot.connected);
        assert!(!snapshot.recent_errors.is_empty());
    }
}
