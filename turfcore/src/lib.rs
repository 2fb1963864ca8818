//! # Turf Core
//!
//! Run tracking and territory-capture algorithms for the Turf running game.
//!
//! This library provides:
//! - Geometry utilities (haversine distance, planar polygon area, ray casting)
//! - A fixed-size lat/lon territory grid with per-cell ownership
//! - Run session accumulation (distance, duration, pace)
//! - The run screen state machine driven by explicit events
//! - Onboarding validation and leaderboard ranking
//!
//! ## Features
//!
//! - **`parallel`** - Classify territory grid rows in parallel with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use turfcore::{LocationModel, RunTracker};
//!
//! let mut tracker = RunTracker::default();
//! tracker.start_tracking("run-1", 1_000);
//! tracker.on_location_update(LocationModel::new(51.5074, -0.1278).at(1_000), 1_000);
//! tracker.on_location_update(LocationModel::new(51.5083, -0.1278).at(61_000), 61_000);
//!
//! let session = tracker.finish_run(61_000).expect("session was running");
//! assert!(session.distance > 90.0);
//! assert!(!session.is_active);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TurfError};

// Geographic utilities (distance, area, point-in-polygon)
pub mod geo_utils;

// Area capture and injectable area calculators
pub mod area;
pub use area::{AreaCalculator, AreaCapture, AreaModel, MIN_CAPTURE_POINTS, PlanarAreaCalculator};

// Territory grid assignment and ownership summaries
pub mod territory;
pub use territory::{
    CellIndex, DEFAULT_CELL_SIZE_DEG, DEFAULT_MAX_CLAIM_CELLS, OwnerTerritory, TerritoryCell,
    TerritoryGrid, TerritoryIndex, resolve_ownership, summarize_territory,
};

// Pace and display formatting
pub mod pace;
pub use pace::{PLACEHOLDER_PACE, format_distance_km, format_duration, format_pace};

// Run session accumulation
pub mod session;
pub use session::{RunSession, RunStats, SessionConfig};

// Run screen state machine
pub mod state;
pub use state::{ClaimSummary, RunEvent, RunScreenState, RunTracker, RunUiState, reduce};

// Onboarding steps and validation
pub mod onboarding;
pub use onboarding::{
    OnboardingForm, OnboardingStep, UserProfile, can_proceed_from_email,
    can_proceed_from_name, can_proceed_from_password,
};

// Leaderboard ranking
pub mod leaderboard;
pub use leaderboard::{LeaderboardEntry, LeaderboardMetric, RunnerTotals, build_leaderboard};

// Simulated location input
pub mod simulate;

// ============================================================================
// Core Types
// ============================================================================

/// A single location sample.
///
/// Produced by the platform location provider or by simulated drag input.
/// Samples are immutable once created; paths and capture polygons are
/// ordered lists of them.
///
/// # Example
/// ```
/// use turfcore::LocationModel;
/// let point = LocationModel::new(51.5074, -0.1278); // London
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationModel {
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude in meters above the WGS84 ellipsoid (0 when unknown)
    #[serde(default)]
    pub altitude: f64,
    /// Horizontal accuracy radius in meters (0 when unknown)
    #[serde(default)]
    pub accuracy: f64,
    /// Unix timestamp in milliseconds
    #[serde(default)]
    pub timestamp: i64,
}

impl LocationModel {
    /// Create a sample with only a position.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: 0.0,
            accuracy: 0.0,
            timestamp: 0,
        }
    }

    /// Create a fully specified sample.
    pub fn with_fix(
        latitude: f64,
        longitude: f64,
        altitude: f64,
        accuracy: f64,
        timestamp: i64,
    ) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            accuracy,
            timestamp,
        }
    }

    /// Return a copy stamped with the given timestamp (ms).
    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Return a copy with the given accuracy radius (m).
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    /// Check if the sample has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from location samples.
    pub fn from_points(points: &[LocationModel]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> LocationModel {
        LocationModel::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Whether a coordinate lies inside (or on the edge of) the bounds.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.min_lat
            && latitude <= self.max_lat
            && longitude >= self.min_lng
            && longitude <= self.max_lng
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_validation() {
        assert!(LocationModel::new(51.5074, -0.1278).is_valid());
        assert!(!LocationModel::new(91.0, 0.0).is_valid());
        assert!(!LocationModel::new(0.0, 181.0).is_valid());
        assert!(!LocationModel::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_bounds_from_points() {
        let points = vec![
            LocationModel::new(51.5074, -0.1278),
            LocationModel::new(51.5100, -0.1310),
            LocationModel::new(51.5080, -0.1290),
        ];
        let bounds = Bounds::from_points(&points).unwrap();
        assert_eq!(bounds.min_lat, 51.5074);
        assert_eq!(bounds.max_lat, 51.5100);
        assert_eq!(bounds.min_lng, -0.1310);
        assert_eq!(bounds.max_lng, -0.1278);
        assert!(bounds.contains(51.509, -0.13));
        assert!(!bounds.contains(51.6, -0.13));
        assert!(Bounds::from_points(&[]).is_none());
    }

    #[test]
    fn test_location_serializes_camel_case() {
        let loc = LocationModel::with_fix(1.0, 2.0, 3.0, 4.0, 5);
        let json = serde_json::to_string(&loc).unwrap();
        assert!(json.contains("\"latitude\":1.0"));
        assert!(json.contains("\"timestamp\":5"));

        let parsed: LocationModel =
            serde_json::from_str(r#"{"latitude":1.0,"longitude":2.0}"#).unwrap();
        assert_eq!(parsed.accuracy, 0.0);
        assert_eq!(parsed.timestamp, 0);
    }
}
