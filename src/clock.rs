use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch as a float, the timestamp unit every
/// store in this crate uses.
pub fn now_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Current time as an RFC 3339 string (UTC, second precision).
pub fn iso_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
