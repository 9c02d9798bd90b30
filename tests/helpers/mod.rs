//! Test helpers shared by the integration tests

#![allow(dead_code)]

use vigia::{CpuEnvelope, MemoryEnvelope, MessageEnvelope};

/// JSON payload for a fully-populated memory envelope
pub fn memory_payload(sensor_id: &str, value: f64, timestamp: f64) -> Vec<u8> {
    serde_json::to_vec(&MemoryEnvelope {
        timestamp,
        sensor_id: sensor_id.to_string(),
        system_memory: value,
    })
    .unwrap()
}

/// JSON payload for a fully-populated cpu envelope
pub fn cpu_payload(sensor_id: &str, value: f64, timestamp: f64) -> Vec<u8> {
    serde_json::to_vec(&CpuEnvelope {
        timestamp,
        sensor_id: sensor_id.to_string(),
        cpu_percent: value,
    })
    .unwrap()
}

/// JSON payload for a fully-populated message envelope
pub fn message_payload(messenger_id: &str, message: &str, timestamp: f64) -> Vec<u8> {
    serde_json::to_vec(&MessageEnvelope {
        timestamp,
        messenger_id: messenger_id.to_string(),
        message: message.to_string(),
    })
    .unwrap()
}
