use chrono::{DateTime, TimeZone, Utc};

/// Convert a timestamp to seconds since the UNIX epoch.
pub fn datetime_to_f64<TZ: TimeZone>(dt: &DateTime<TZ>) -> f64 {
    dt.timestamp() as f64 + dt.timestamp_subsec_nanos() as f64 * 1e-9
}

/// Convert seconds since the UNIX epoch to a UTC timestamp.
pub fn f64_to_datetime(timestamp: f64) -> DateTime<Utc> {
    let secs_f = timestamp.floor();
    let nsecs = (((timestamp - secs_f) * 1e9).round() as u32).min(999_999_999);
    Utc.timestamp_opt(secs_f as i64, nsecs).unwrap()
}
