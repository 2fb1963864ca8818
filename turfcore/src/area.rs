//! Area capture.
//!
//! A capture collects the vertices a runner outlines on the map and, once
//! finished, becomes an immutable [`AreaModel`]. The area itself comes from
//! an injected [`AreaCalculator`] so callers (and tests) can swap the
//! projection.

use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result, TurfError};
use crate::{LocationModel, geo_utils};

/// Minimum number of vertices a capture needs to enclose an area.
pub const MIN_CAPTURE_POINTS: usize = 3;

/// A completed capture polygon and its area in square meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaModel {
    /// Open ring of vertices in capture order
    pub polygon: Vec<LocationModel>,
    /// Area in square meters
    pub area: f64,
}

/// Computes the area enclosed by an open ring.
pub trait AreaCalculator: Send + Sync {
    fn calculate_area(&self, polygon: &[LocationModel]) -> f64;
}

/// Shoelace area over an equirectangular projection.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarAreaCalculator;

impl AreaCalculator for PlanarAreaCalculator {
    fn calculate_area(&self, polygon: &[LocationModel]) -> f64 {
        geo_utils::polygon_area(polygon)
    }
}

impl<F> AreaCalculator for F
where
    F: Fn(&[LocationModel]) -> f64 + Send + Sync,
{
    fn calculate_area(&self, polygon: &[LocationModel]) -> f64 {
        self(polygon)
    }
}

/// An in-progress capture polygon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaCapture {
    points: Vec<LocationModel>,
}

impl AreaCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[LocationModel] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Append a vertex. Invalid coordinates are rejected.
    ///
    /// A vertex equal to the first one is treated as closing the ring and
    /// is not stored, since rings are kept open.
    pub fn add_point(&mut self, point: LocationModel) -> Result<()> {
        if !point.is_valid() {
            return Err(TurfError::InvalidCoordinates {
                latitude: point.latitude,
                longitude: point.longitude,
            });
        }
        let closes_ring = self.points.len() >= MIN_CAPTURE_POINTS
            && self.points.first().is_some_and(|first| {
                first.latitude == point.latitude && first.longitude == point.longitude
            });
        if closes_ring {
            return Ok(());
        }
        self.points.push(point);
        Ok(())
    }

    /// Remove the most recent vertex.
    pub fn undo(&mut self) -> Option<LocationModel> {
        self.points.pop()
    }

    /// Close the ring and compute its area.
    pub fn finish(&self, calculator: &dyn AreaCalculator) -> Result<AreaModel> {
        let polygon = (self.points.len() >= MIN_CAPTURE_POINTS)
            .then(|| self.points.clone())
            .ok_or_insufficient_points("area capture", self.points.len(), MIN_CAPTURE_POINTS)?;

        let area = calculator.calculate_area(&polygon);
        Ok(AreaModel { polygon, area })
    }
}

impl AreaModel {
    /// Compute an area model directly from a ring with the planar calculator.
    pub fn from_polygon(polygon: Vec<LocationModel>) -> Result<Self> {
        let capture = AreaCapture { points: polygon };
        capture.finish(&PlanarAreaCalculator)
    }
}
