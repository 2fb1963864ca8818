//! Run session accumulation.
//!
//! A session is created when tracking starts, grows with every accepted
//! location sample, and is finalized (end time set, inactive) when the run
//! is finished or stopped.

use serde::{Deserialize, Serialize};

use crate::{AreaModel, Bounds, LocationModel, geo_utils, pace};

/// Sample acceptance settings for a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Samples with a worse accuracy radius are dropped. 0 disables the filter.
    /// Default: 50.0 meters
    pub max_accuracy_m: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_accuracy_m: 50.0,
        }
    }
}

impl SessionConfig {
    /// Whether a sample is good enough to extend a path.
    pub fn accepts(&self, sample: &LocationModel) -> bool {
        sample.is_valid() && (self.max_accuracy_m <= 0.0 || sample.accuracy <= self.max_accuracy_m)
    }
}

/// A recorded run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSession {
    pub id: String,
    /// Unix timestamp (ms) when tracking started
    pub start_time: i64,
    /// Unix timestamp (ms) when the run was finished or stopped
    pub end_time: Option<i64>,
    pub path: Vec<LocationModel>,
    /// Distance in meters
    pub distance: f64,
    /// Wall-clock duration in milliseconds since start
    pub duration: i64,
    /// Average pace formatted as `M'SS''`
    pub average_pace: String,
    pub captured_areas: Vec<AreaModel>,
    pub is_active: bool,
}

impl RunSession {
    /// Begin a new active session.
    pub fn start(id: impl Into<String>, start_time: i64) -> Self {
        Self {
            id: id.into(),
            start_time,
            end_time: None,
            path: Vec::new(),
            distance: 0.0,
            duration: 0,
            average_pace: pace::PLACEHOLDER_PACE.to_string(),
            captured_areas: Vec::new(),
            is_active: true,
        }
    }

    /// Append a sample and recompute distance, duration and pace.
    ///
    /// Returns false (and changes nothing) when the session is finalized or
    /// the sample is rejected by `config`.
    pub fn record_location(
        &mut self,
        sample: LocationModel,
        now: i64,
        config: &SessionConfig,
    ) -> bool {
        if !self.is_active || !config.accepts(&sample) {
            return false;
        }
        if let Some(last) = self.path.last() {
            self.distance += geo_utils::haversine_distance(last, &sample);
        }
        self.path.push(sample);
        self.refresh(now);
        true
    }

    /// Recompute duration and pace against the wall clock.
    pub fn refresh(&mut self, now: i64) {
        self.duration = (now - self.start_time).max(0);
        self.average_pace = pace::format_pace(self.duration, self.distance);
    }

    /// Finalize the session.
    pub fn finish(&mut self, now: i64) {
        if !self.is_active {
            return;
        }
        self.refresh(now);
        self.end_time = Some(now);
        self.is_active = false;
    }

    pub fn add_area(&mut self, area: AreaModel) {
        self.captured_areas.push(area);
    }

    /// Sum of captured area in square meters.
    pub fn total_captured_area(&self) -> f64 {
        self.captured_areas.iter().map(|a| a.area).sum()
    }

    /// Sum of positive altitude changes along the path.
    pub fn elevation_gain(&self) -> f64 {
        self.path
            .windows(2)
            .map(|pair| (pair[1].altitude - pair[0].altitude).max(0.0))
            .sum()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.path)
    }

    pub fn last_location(&self) -> Option<&LocationModel> {
        self.path.last()
    }

    /// Display figures for the run summary.
    pub fn stats(&self) -> RunStats {
        RunStats {
            distance_km: pace::format_distance_km(self.distance),
            duration: pace::format_duration(self.duration),
            pace: self.average_pace.clone(),
            speed_kmh: pace::speed_kmh(self.duration, self.distance),
            elevation_gain_m: self.elevation_gain(),
            captured_area_m2: self.total_captured_area(),
        }
    }
}

/// Formatted figures shown on the run and summary screens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub distance_km: String,
    pub duration: String,
    pub pace: String,
    pub speed_kmh: f64,
    pub elevation_gain_m: f64,
    pub captured_area_m2: f64,
}
