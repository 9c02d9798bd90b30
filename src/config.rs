//! Environment-driven configuration for the three binaries.
//!
//! Required numeric options missing from the environment are startup-fatal;
//! identity strings fall back to default literals.

use anyhow::{Context, Result};

const MQTT_CLUSTER_URL: &str = "MQTT_CLUSTER_URL";
const MQTT_PORT: &str = "MQTT_PORT";
const MQTT_USERNAME: &str = "MQTT_USERNAME";
const MQTT_PASSWORD: &str = "MQTT_PASSWORD";
const MQTT_TLS: &str = "MQTT_TLS";

const PUBLISH_INTERVAL: &str = "PUBLISH_INTERVAL";
const SUMMARY_INTERVAL: &str = "SUMMARY_INTERVAL";
const SENSOR_ID: &str = "SENSOR_ID";
const MESSENGER_ID: &str = "MESSENGER_ID";
const SUBSCRIBER_ID: &str = "SUBSCRIBER_ID";
const HTTP_PORT: &str = "HTTP_PORT";
const SNAPSHOT_PORT: &str = "SNAPSHOT_PORT";

const DEFAULT_MQTT_PORT: u16 = 8883;
const DEFAULT_SUMMARY_INTERVAL: u64 = 120;
const DEFAULT_HTTP_PORT: u16 = 8000;
const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;

/// Broker connection settings shared by all binaries.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
    pub keep_alive_secs: u64,
}

impl MqttConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup(MQTT_CLUSTER_URL)
            .with_context(|| format!("{MQTT_CLUSTER_URL} must be set"))?;

        let port = parse_or_default(lookup(MQTT_PORT), MQTT_PORT, DEFAULT_MQTT_PORT)?;

        let use_tls = match lookup(MQTT_TLS) {
            Some(raw) => raw
                .parse::<bool>()
                .with_context(|| format!("{MQTT_TLS} must be true or false, got '{raw}'"))?,
            None => true,
        };

        Ok(Self {
            host,
            port,
            username: lookup(MQTT_USERNAME),
            password: lookup(MQTT_PASSWORD),
            use_tls,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
        })
    }
}

/// Configuration for `vigia-sensor`.
#[derive(Debug, Clone)]
pub struct SensorConfig {
    pub sensor_id: String,
    /// Seconds between metric samples. Required.
    pub publish_interval: u64,
    pub mqtt: MqttConfig,
}

impl SensorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let publish_interval = lookup(PUBLISH_INTERVAL)
            .with_context(|| format!("{PUBLISH_INTERVAL} must be set"))?;
        let publish_interval: u64 = publish_interval
            .parse()
            .with_context(|| format!("{PUBLISH_INTERVAL} must be a number of seconds"))?;
        anyhow::ensure!(publish_interval > 0, "{PUBLISH_INTERVAL} must be at least 1");

        Ok(Self {
            sensor_id: lookup(SENSOR_ID).unwrap_or_else(|| String::from("unknown")),
            publish_interval,
            mqtt: MqttConfig::from_lookup(lookup)?,
        })
    }
}

/// Configuration for `vigia-messenger`.
#[derive(Debug, Clone)]
pub struct MessengerConfig {
    pub messenger_id: String,
    /// Port for the message-submission HTTP endpoint.
    pub http_port: u16,
    pub mqtt: MqttConfig,
}

impl MessengerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            messenger_id: lookup(MESSENGER_ID).unwrap_or_else(|| String::from("unknown")),
            http_port: parse_or_default(lookup(HTTP_PORT), HTTP_PORT, DEFAULT_HTTP_PORT)?,
            mqtt: MqttConfig::from_lookup(lookup)?,
        })
    }
}

/// Configuration for `vigia-subscriber`.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub subscriber_id: String,
    /// Seconds between summary renders.
    pub summary_interval: u64,
    /// Port for the snapshot API; disabled when unset.
    pub snapshot_port: Option<u16>,
    pub mqtt: MqttConfig,
}

impl SubscriberConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let snapshot_port = lookup(SNAPSHOT_PORT)
            .map(|raw| {
                raw.parse()
                    .with_context(|| format!("{SNAPSHOT_PORT} must be a port number, got '{raw}'"))
            })
            .transpose()?;

        let summary_interval = parse_or_default(
            lookup(SUMMARY_INTERVAL),
            SUMMARY_INTERVAL,
            DEFAULT_SUMMARY_INTERVAL,
        )?;
        anyhow::ensure!(summary_interval > 0, "{SUMMARY_INTERVAL} must be at least 1");

        Ok(Self {
            subscriber_id: lookup(SUBSCRIBER_ID)
                .unwrap_or_else(|| String::from("monitoring-subscriber-001")),
            summary_interval,
            snapshot_port,
            mqtt: MqttConfig::from_lookup(lookup)?,
        })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_or_default<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{key} has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}
