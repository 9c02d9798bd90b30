pub mod aggregator;
pub mod api;
pub mod config;
pub mod reporter;
pub mod sampler;
pub mod transport;
pub mod util;

use serde::{Deserialize, Serialize};

/// Topic carrying memory utilisation envelopes.
pub const MEMORY_TOPIC: &str = "monitoring/memory";

/// Topic carrying CPU utilisation envelopes.
pub const CPU_TOPIC: &str = "monitoring/cpu";

/// Topic carrying user-submitted text messages.
pub const MESSAGES_TOPIC: &str = "monitoring/messages";

/// Wire envelope published to [`MEMORY_TOPIC`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEnvelope {
    /// Unix seconds at sampling time
    pub timestamp: f64,
    pub sensor_id: String,
    /// System memory utilisation in percent
    pub system_memory: f64,
}

/// Wire envelope published to [`CPU_TOPIC`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuEnvelope {
    pub timestamp: f64,
    pub sensor_id: String,
    /// Average CPU utilisation in percent
    pub cpu_percent: f64,
}

/// Wire envelope published to [`MESSAGES_TOPIC`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub timestamp: f64,
    pub messenger_id: String,
    pub message: String,
}

impl MemoryEnvelope {
    pub fn now(sensor_id: &str, system_memory: f64) -> Self {
        Self {
            timestamp: util::unix_now(),
            sensor_id: sensor_id.to_string(),
            system_memory,
        }
    }
}

impl CpuEnvelope {
    pub fn now(sensor_id: &str, cpu_percent: f64) -> Self {
        Self {
            timestamp: util::unix_now(),
            sensor_id: sensor_id.to_string(),
            cpu_percent,
        }
    }
}

impl MessageEnvelope {
    pub fn now(messenger_id: &str, message: String) -> Self {
        Self {
            timestamp: util::unix_now(),
            messenger_id: messenger_id.to_string(),
            message,
        }
    }
}
