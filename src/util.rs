use std::time::{SystemTime, UNIX_EPOCH};

use chrono::DateTime;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_LEVEL: &str = "LOG_LEVEL";

/// Initialize tracing for a binary, taking the level from `LOG_LEVEL`.
///
/// Unknown or missing levels fall back to INFO.
pub fn init_tracing(component: &'static str) {
    let level = std::env::var(LOG_LEVEL)
        .ok()
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::INFO);

    let filter = filter::Targets::new().with_targets(vec![("vigia", level), (component, level)]);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

/// Current wall-clock time as unix seconds.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Render a unix-seconds timestamp as `YYYY-MM-DD HH:MM:SS` (UTC).
///
/// Timestamps outside the representable range are shown as raw seconds.
pub fn readable_time(timestamp: f64) -> String {
    let secs = timestamp.trunc() as i64;
    let nanos = (timestamp.fract().abs() * 1e9) as u32;

    DateTime::from_timestamp(secs, nanos)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| format!("{timestamp:.0}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readable_time_epoch() {
        assert_eq!(readable_time(0.0), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_readable_time_known_instant() {
        // 2023-11-14T22:13:20Z
        assert_eq!(readable_time(1_700_000_000.0), "2023-11-14 22:13:20");
    }

    #[test]
    fn test_readable_time_out_of_range_falls_back() {
        let rendered = readable_time(1e18);
        assert!(rendered.contains("1000000000000000000"));
    }

    #[test]
    fn test_unix_now_is_recent() {
        // Sanity: after 2020, before 2100
        let now = unix_now();
        assert!(now > 1_577_836_800.0);
        assert!(now < 4_102_444_800.0);
    }
}
