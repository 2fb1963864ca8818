//! Pace and display formatting.
//!
//! Pace is minutes and seconds per kilometer, written `M'SS''`.

/// Pace shown when distance or duration is zero.
pub const PLACEHOLDER_PACE: &str = "0'00''";

/// Seconds per kilometer, or `None` when it cannot be computed.
pub fn pace_seconds_per_km(duration_ms: i64, distance_m: f64) -> Option<f64> {
    if duration_ms <= 0 || !(distance_m > 0.0) {
        return None;
    }
    let pace = (duration_ms as f64 / 1000.0) / (distance_m / 1000.0);
    pace.is_finite().then_some(pace)
}

/// Format pace as `M'SS''` per kilometer.
///
/// # Example
/// ```
/// use turfcore::format_pace;
/// assert_eq!(format_pace(330_000, 1000.0), "5'30''");
/// assert_eq!(format_pace(0, 1000.0), "0'00''");
/// ```
pub fn format_pace(duration_ms: i64, distance_m: f64) -> String {
    match pace_seconds_per_km(duration_ms, distance_m) {
        Some(pace) => {
            let total = pace.floor() as i64;
            format!("{}'{:02}''", total / 60, total % 60)
        }
        None => PLACEHOLDER_PACE.to_string(),
    }
}

/// Format elapsed time as `MM:SS`, or `H:MM:SS` from one hour up.
pub fn format_duration(duration_ms: i64) -> String {
    let total = duration_ms.max(0) / 1000;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Format a distance in meters as kilometers with two decimals.
pub fn format_distance_km(distance_m: f64) -> String {
    format!("{:.2}", distance_m.max(0.0) / 1000.0)
}

/// Average speed in km/h (0 when undefined).
pub fn speed_kmh(duration_ms: i64, distance_m: f64) -> f64 {
    if duration_ms <= 0 || distance_m <= 0.0 {
        return 0.0;
    }
    (distance_m / 1000.0) / (duration_ms as f64 / 3_600_000.0)
}
