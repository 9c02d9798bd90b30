//! Property-based tests for aggregation invariants using proptest

use proptest::prelude::*;
use vigia::{
    CPU_TOPIC, MEMORY_TOPIC,
    aggregator::{Aggregator, METRIC_WINDOW_CAPACITY},
};

mod helpers;
use helpers::*;

// Property: counts equal exactly the number of valid envelopes, the window
// never exceeds capacity, and it retains the newest entries in order.
proptest! {
    #[test]
    fn prop_window_bounded_and_fifo(values in prop::collection::vec(0.0f64..100.0, 0..300)) {
        let aggregator = Aggregator::new();

        for (i, value) in values.iter().enumerate() {
            aggregator.ingest(MEMORY_TOPIC, &memory_payload("s1", *value, i as f64));
        }

        let snapshot = aggregator.snapshot();
        prop_assert_eq!(snapshot.counts.memory, values.len() as u64);
        prop_assert_eq!(
            snapshot.memory_window.len(),
            values.len().min(METRIC_WINDOW_CAPACITY)
        );

        // The window is exactly the tail of the input, in arrival order
        let tail_start = values.len().saturating_sub(METRIC_WINDOW_CAPACITY);
        let retained: Vec<f64> = snapshot.memory_window.iter().map(|p| p.value).collect();
        prop_assert_eq!(retained, values[tail_start..].to_vec());

        // Latest reading is the last write
        if let Some(last) = values.last() {
            prop_assert_eq!(snapshot.latest_readings["s1"].memory.unwrap().value, *last);
        } else {
            prop_assert!(snapshot.latest_readings.is_empty());
        }
    }
}

// Property: per-category counts are exact under arbitrary interleaving.
proptest! {
    #[test]
    fn prop_counts_exact_per_category(choices in prop::collection::vec(any::<bool>(), 0..200)) {
        let aggregator = Aggregator::new();

        let mut expected_memory = 0u64;
        let mut expected_cpu = 0u64;

        for (i, is_memory) in choices.iter().enumerate() {
            if *is_memory {
                aggregator.ingest(MEMORY_TOPIC, &memory_payload("s1", 1.0, i as f64));
                expected_memory += 1;
            } else {
                aggregator.ingest(CPU_TOPIC, &cpu_payload("s1", 1.0, i as f64));
                expected_cpu += 1;
            }
        }

        let snapshot = aggregator.snapshot();
        prop_assert_eq!(snapshot.counts.memory, expected_memory);
        prop_assert_eq!(snapshot.counts.cpu, expected_cpu);
        prop_assert_eq!(snapshot.counts.messages, 0);
    }
}

// Property: arbitrary bytes never panic ingestion and never inflate counts.
proptest! {
    #[test]
    fn prop_arbitrary_payload_never_panics(payload in prop::collection::vec(any::<u8>(), 0..256)) {
        let aggregator = Aggregator::new();
        aggregator.ingest(MEMORY_TOPIC, &payload);

        let snapshot = aggregator.snapshot();
        prop_assert!(snapshot.counts.memory <= 1);
        prop_assert!(snapshot.memory_window.len() <= METRIC_WINDOW_CAPACITY);
        prop_assert!(snapshot.recent_errors.len() <= 1);
    }
}

// Property: invalid envelopes never change what valid ones produced.
proptest! {
    #[test]
    fn prop_invalid_envelopes_leave_state_untouched(
        valid in 1usize..50,
        invalid in 0usize..50,
    ) {
        let aggregator = Aggregator::new();

        for i in 0..valid {
            aggregator.ingest(MEMORY_TOPIC, &memory_payload("s1", i as f64, i as f64));
        }

        let before = aggregator.snapshot();

        for _ in 0..invalid {
            // Missing the required field
            aggregator.ingest(MEMORY_TOPIC, br#"{"sensor_id": "s1", "timestamp": 0.0}"#);
        }

        let after = aggregator.snapshot();
        prop_assert_eq!(after.counts.memory, before.counts.memory);
        prop_assert_eq!(after.memory_window.len(), before.memory_window.len());
        prop_assert_eq!(
            after.latest_readings["s1"].memory.unwrap().value,
            before.latest_readings["s1"].memory.unwrap().value
        );
    }
}

// Property: missing identity always resolves to the "unknown" source.
proptest! {
    #[test]
    fn prop_missing_identity_defaults_to_unknown(value in 0.0f64..100.0) {
        let aggregator = Aggregator::new();
        let payload = serde_json::to_vec(&serde_json::json!({
            "timestamp": 1.0,
            "system_memory": value,
        })).unwrap();

        aggregator.ingest(MEMORY_TOPIC, &payload);

        let snapshot = aggregator.snapshot();
        prop_assert!(snapshot.latest_readings.contains_key("unknown"));
        prop_assert_eq!(snapshot.memory_window[0].sensor_id.as_str(), "unknown");
    }
}
