//! Simulated location input.
//!
//! Generates timestamped samples along a list of waypoints at a constant
//! speed. Used in place of a GPS provider for demos and tests.

use crate::{LocationModel, geo_utils};

/// Accuracy reported on simulated samples (m).
const SIMULATED_ACCURACY_M: f64 = 5.0;

/// Shortest distance between consecutive samples (m).
pub const MIN_STEP_M: f64 = 0.1;

/// Most samples a single simulation may produce.
pub const MAX_SIMULATED_SAMPLES: usize = 100_000;

fn lerp(a: &LocationModel, b: &LocationModel, t: f64) -> (f64, f64, f64) {
    (
        a.latitude + (b.latitude - a.latitude) * t,
        a.longitude + (b.longitude - a.longitude) * t,
        a.altitude + (b.altitude - a.altitude) * t,
    )
}

/// Walk `waypoints` at `speed_mps`, emitting a sample every `interval_ms`.
///
/// The first sample is the first waypoint at `start_time`; the last is the
/// final waypoint. Returns an empty vector for non-positive speed or
/// interval, for steps shorter than [`MIN_STEP_M`], and for routes that would
/// need more than [`MAX_SIMULATED_SAMPLES`] samples.
pub fn simulate_route(
    waypoints: &[LocationModel],
    speed_mps: f64,
    interval_ms: i64,
    start_time: i64,
) -> Vec<LocationModel> {
    let Some(first) = waypoints.first() else {
        return Vec::new();
    };
    if speed_mps <= 0.0 || !speed_mps.is_finite() || interval_ms <= 0 {
        return Vec::new();
    }

    let step_m = speed_mps * interval_ms as f64 / 1000.0;
    if step_m < MIN_STEP_M {
        log::warn!("[Simulate] Step of {} m is below {} m", step_m, MIN_STEP_M);
        return Vec::new();
    }
    let estimate = geo_utils::path_distance(waypoints) / step_m + 2.0;
    if estimate.is_nan() || estimate > MAX_SIMULATED_SAMPLES as f64 {
        log::warn!(
            "[Simulate] Route needs about {:.0} samples, limit is {}",
            estimate,
            MAX_SIMULATED_SAMPLES
        );
        return Vec::new();
    }

    let mut samples = vec![sample(
        first.latitude,
        first.longitude,
        first.altitude,
        start_time,
    )];
    let mut timestamp = start_time;
    // Distance already travelled past the start of the current segment
    let mut carried = 0.0;

    for pair in waypoints.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let length = geo_utils::haversine_distance(a, b);
        if length <= 0.0 {
            continue;
        }
        let mut offset = step_m - carried;
        while offset <= length {
            let (lat, lon, alt) = lerp(a, b, offset / length);
            timestamp += interval_ms;
            samples.push(sample(lat, lon, alt, timestamp));
            offset += step_m;
        }
        carried = length - (offset - step_m);
    }

    if let Some(last) = waypoints.last() {
        let at_end = samples
            .last()
            .is_some_and(|s| geo_utils::haversine_distance(s, last) < 1e-6);
        if !at_end {
            let remaining_ms = (carried / speed_mps * 1000.0).round() as i64;
            timestamp += remaining_ms.max(1);
            samples.push(sample(last.latitude, last.longitude, last.altitude, timestamp));
        }
    }

    samples
}

/// Evenly spaced samples between two map points, as produced by a finger
/// drag on the map.
pub fn drag_samples(
    from: &LocationModel,
    to: &LocationModel,
    steps: usize,
    start_time: i64,
    interval_ms: i64,
) -> Vec<LocationModel> {
    if steps == 0 || steps >= MAX_SIMULATED_SAMPLES {
        return Vec::new();
    }
    (0..=steps)
        .map(|i| {
            let (lat, lon, alt) = lerp(from, to, i as f64 / steps as f64);
            sample(lat, lon, alt, start_time + i as i64 * interval_ms)
        })
        .collect()
}

fn sample(latitude: f64, longitude: f64, altitude: f64, timestamp: i64) -> LocationModel {
    LocationModel::with_fix(
        latitude,
        longitude,
        altitude,
        SIMULATED_ACCURACY_M,
        timestamp,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> Vec<LocationModel> {
        vec![
            LocationModel::new(51.5000, -0.1200),
            LocationModel::new(51.5050, -0.1200),
            LocationModel::new(51.5050, -0.1150),
        ]
    }

    #[test]
    fn test_route_follows_waypoints() {
        let samples = simulate_route(&route(), 3.0, 1_000, 10_000);
        let total = geo_utils::path_distance(&route());

        assert_eq!(samples.first().unwrap().timestamp, 10_000);
        let last = samples.last().unwrap();
        assert_eq!(last.latitude, 51.5050);
        assert_eq!(last.longitude, -0.1150);

        // Roughly one sample per 3 m
        let expected = (total / 3.0) as usize;
        assert!(samples.len() >= expected && samples.len() <= expected + 3);

        // Distance is preserved up to corner cutting
        let walked = geo_utils::path_distance(&samples);
        assert!((walked - total).abs() < 5.0);

        assert!(samples.windows(2).all(|w| w[1].timestamp > w[0].timestamp));
        assert!(samples.iter().all(|s| s.is_valid()));
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(simulate_route(&[], 3.0, 1_000, 0).is_empty());
        assert!(simulate_route(&route(), 0.0, 1_000, 0).is_empty());
        assert!(simulate_route(&route(), 3.0, 0, 0).is_empty());

        let single = simulate_route(&route()[..1], 3.0, 1_000, 0);
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_tiny_step_is_rejected() {
        // 1 mm per sample over a 10 m walk would never finish
        let walk = [
            LocationModel::new(51.5, -0.12),
            LocationModel::new(51.50009, -0.12),
        ];
        assert!(simulate_route(&walk, 0.001, 1, 0).is_empty());
        assert!(!simulate_route(&walk, 0.1, 1_000, 0).is_empty());
    }

    #[test]
    fn test_long_route_is_capped() {
        // Half the globe at 1 m per sample
        let far = [LocationModel::new(0.0, 0.0), LocationModel::new(0.0, 179.0)];
        assert!(simulate_route(&far, 1.0, 1_000, 0).is_empty());

        let samples = simulate_route(&far, 1_000.0, 1_000, 0);
        assert!(!samples.is_empty());
        assert!(samples.len() <= MAX_SIMULATED_SAMPLES);
    }

    #[test]
    fn test_drag_samples() {
        let a = LocationModel::new(0.0, 0.0);
        let b = LocationModel::new(0.001, 0.002);
        let samples = drag_samples(&a, &b, 4, 0, 100);
        assert_eq!(samples.len(), 5);
        assert_eq!(samples[0].latitude, 0.0);
        assert!((samples[4].longitude - 0.002).abs() < 1e-12);
        assert_eq!(samples[2].timestamp, 200);
        assert!(drag_samples(&a, &b, 0, 0, 100).is_empty());
        let too_many = drag_samples(&a, &b, MAX_SIMULATED_SAMPLES, 0, 100);
        assert!(too_many.is_empty());
    }
}
