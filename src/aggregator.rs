//! Subscriber-side aggregation core.
//!
//! The [`Aggregator`] ingests raw `(topic, payload)` deliveries from the MQTT
//! transport, validates them into typed records, and maintains the shared
//! monitoring state: latest reading per source, bounded recent windows,
//! per-category counters, and a short diagnostic log. All state lives behind
//! a single mutex; ingestion and snapshot reads are both brief, bounded work.
//!
//! Ingestion never fails past its boundary. Malformed or incomplete
//! envelopes are logged and discarded without touching the data model, so
//! the transport's delivery loop is never interrupted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::util;
use crate::{CPU_TOPIC, MEMORY_TOPIC, MESSAGES_TOPIC};

/// Capacity of the recent-window ring buffers for metric categories.
pub const METRIC_WINDOW_CAPACITY: usize = 100;

/// Capacity of the recent-window ring buffer for messages.
pub const MESSAGE_WINDOW_CAPACITY: usize = 50;

/// Number of diagnostic entries retained for the snapshot.
pub const ERROR_LOG_CAPACITY: usize = 10;

/// Message category, derived from the topic an envelope arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Memory,
    Cpu,
    Message,
}

impl Category {
    pub fn from_topic(topic: &str) -> Option<Self> {
        match topic {
            MEMORY_TOPIC => Some(Category::Memory),
            CPU_TOPIC => Some(Category::Cpu),
            MESSAGES_TOPIC => Some(Category::Message),
            _ => None,
        }
    }
}

/// Lenient wire-side view of a memory envelope.
///
/// Only the value field is required; identity and timestamp are defaulted
/// during resolution.
#[derive(Debug, Deserialize)]
struct RawMemoryEnvelope {
    timestamp: Option<f64>,
    sensor_id: Option<String>,
    system_memory: f64,
}

#[derive(Debug, Deserialize)]
struct RawCpuEnvelope {
    timestamp: Option<f64>,
    sensor_id: Option<String>,
    cpu_percent: f64,
}

#[derive(Debug, Deserialize)]
struct RawMessageEnvelope {
    timestamp: Option<f64>,
    messenger_id: Option<String>,
    message: Option<String>,
}

/// A fully-resolved metric data point, as retained in the recent windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: f64,
    pub sensor_id: String,
    pub value: f64,
}

/// A fully-resolved user message, as retained in the message window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEntry {
    pub timestamp: f64,
    pub messenger_id: String,
    pub message: String,
}

/// The most recent value received for one metric of one source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: f64,
    pub timestamp: f64,
}

/// Latest readings for one source, last-write-wins per metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceReadings {
    pub memory: Option<Reading>,
    pub cpu: Option<Reading>,
}

/// Monotonic counters of successfully processed envelopes per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCounts {
    pub memory: u64,
    pub cpu: u64,
    pub messages: u64,
}

/// Owned, point-in-time copy of the aggregator state.
///
/// Holding or mutating a snapshot has no effect on the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub latest_readings: HashMap<String, SourceReadings>,
    pub memory_window: Vec<MetricPoint>,
    pub cpu_window: Vec<MetricPoint>,
    pub messages: Vec<MessageEntry>,
    pub counts: MessageCounts,
    pub connected: bool,
    pub recent_errors: Vec<String>,
}

impl Snapshot {
    /// True when no envelope has been aggregated yet.
    pub fn is_empty(&self) -> bool {
        self.latest_readings.is_empty() && self.messages.is_empty()
    }
}

#[derive(Debug, Default)]
struct AggregatorState {
    latest_readings: HashMap<String, SourceReadings>,
    memory_window: VecDeque<MetricPoint>,
    cpu_window: VecDeque<MetricPoint>,
    messages: VecDeque<MessageEntry>,
    counts: MessageCounts,
    errors: VecDeque<String>,
    connected: bool,
}

/// Shared-state owner for the subscriber.
///
/// Constructed once at startup and handed by `Arc` to the ingest loop, the
/// summary reporter, and the snapshot API.
#[derive(Debug, Default)]
pub struct Aggregator {
    state: Mutex<AggregatorState>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one raw delivery from the transport.
    ///
    /// Decode, route by topic, validate into a typed record, then mutate all
    /// maps under one lock. Every failure is terminal to this single message
    /// only.
    pub fn ingest(&self, topic: &str, payload: &[u8]) {
        let Some(category) = Category::from_topic(topic) else {
            debug!("ignoring message on unrecognized topic '{topic}'");
            return;
        };

        let json: serde_json::Value = match serde_json::from_slice(payload) {
            Ok(json) => json,
            Err(e) => {
                error!("invalid JSON on {topic}: {e}");
                self.push_error(format!("invalid JSON on {topic}: {e}"));
                return;
            }
        };

        match category {
            Category::Memory => self.ingest_memory(json),
            Category::Cpu => self.ingest_cpu(json),
            Category::Message => self.ingest_message(json),
        }
    }

    fn ingest_memory(&self, json: serde_json::Value) {
        let raw: RawMemoryEnvelope = match serde_json::from_value(json) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("discarding memory envelope: {e}");
                return;
            }
        };

        let point = MetricPoint {
            timestamp: raw.timestamp.unwrap_or_else(util::unix_now),
            sensor_id: raw.sensor_id.unwrap_or_else(|| String::from("unknown")),
            value: raw.system_memory,
        };

        {
            let mut state = self.lock();
            let readings = state.latest_readings.entry(point.sensor_id.clone()).or_default();
            readings.memory = Some(Reading {
                value: point.value,
                timestamp: point.timestamp,
            });
            push_bounded(&mut state.memory_window, point.clone(), METRIC_WINDOW_CAPACITY);
            state.counts.memory += 1;
        }

        info!(
            "MEMORY | {} | RAM: {:.1}% | {}",
            point.sensor_id,
            point.value,
            util::readable_time(point.timestamp)
        );
    }

    fn ingest_cpu(&self, json: serde_json::Value) {
        let raw: RawCpuEnvelope = match serde_json::from_value(json) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("discarding cpu envelope: {e}");
                return;
            }
        };

        let point = MetricPoint {
            timestamp: raw.timestamp.unwrap_or_else(util::unix_now),
            sensor_id: raw.sensor_id.unwrap_or_else(|| String::from("unknown")),
            value: raw.cpu_percent,
        };

        {
            let mut state = self.lock();
            let readings = state.latest_readings.entry(point.sensor_id.clone()).or_default();
            readings.cpu = Some(Reading {
                value: point.value,
                timestamp: point.timestamp,
            });
            push_bounded(&mut state.cpu_window, point.clone(), METRIC_WINDOW_CAPACITY);
            state.counts.cpu += 1;
        }

        info!(
            "CPU | {} | CPU usage: {:.1}% | {}",
            point.sensor_id,
            point.value,
            util::readable_time(point.timestamp)
        );
    }

    fn ingest_message(&self, json: serde_json::Value) {
        let raw: RawMessageEnvelope = match serde_json::from_value(json) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("discarding message envelope: {e}");
                return;
            }
        };

        let entry = MessageEntry {
            timestamp: raw.timestamp.unwrap_or_else(util::unix_now),
            messenger_id: raw.messenger_id.unwrap_or_else(|| String::from("unknown")),
            message: raw.message.unwrap_or_else(|| String::from("No message")),
        };

        {
            let mut state = self.lock();
            push_bounded(&mut state.messages, entry.clone(), MESSAGE_WINDOW_CAPACITY);
            state.counts.messages += 1;
        }

        info!(
            "MESSAGE | {} | {} | {}",
            entry.messenger_id,
            entry.message,
            util::readable_time(entry.timestamp)
        );
    }

    /// Record a transport-level diagnostic (connection loss, poll error).
    pub fn record_transport_error(&self, description: &str) {
        self.push_error(format!("{}: {description}", util::readable_time(util::unix_now())));
    }

    /// Update the broker connectivity flag.
    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    /// Take a consistent point-in-time snapshot of the whole state.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot {
            latest_readings: state.latest_readings.clone(),
            memory_window: state.memory_window.iter().cloned().collect(),
            cpu_window: state.cpu_window.iter().cloned().collect(),
            messages: state.messages.iter().cloned().collect(),
            counts: state.counts,
            connected: state.connected,
            recent_errors: state.errors.iter().cloned().collect(),
        }
    }

    fn push_error(&self, entry: String) {
        let mut state = self.lock();
        push_bounded(&mut state.errors, entry, ERROR_LOG_CAPACITY);
    }

    // Ingestion must never fail, so a poisoned lock (a panicked holder) is
    // recovered rather than propagated.
    fn lock(&self) -> MutexGuard<'_, AggregatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn push_bounded<T>(window: &mut VecDeque<T>, item: T, capacity: usize) {
    window.push_back(item);
    if window.len() > capacity {
        window.pop_front();
    }
}
