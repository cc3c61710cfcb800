use std::time::{SystemTime, UNIX_EPOCH};

pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Seconds elapsed since `timestamp`, or 0 when the timestamp is unset or in the future
pub fn seconds_since(timestamp: i64, current_time: i64) -> i64 {
    if timestamp <= 0 {
        return 0;
    }
    (current_time - timestamp).max(0)
}

pub fn hours_to_seconds(hours: f64) -> f64 {
    hours * 3600.0
}
