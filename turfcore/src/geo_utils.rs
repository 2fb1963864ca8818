//! Geographic utilities.
//!
//! Distances are great-circle (haversine). Areas use an equirectangular
//! projection around the polygon's mean latitude, which is only accurate for
//! the small regions a runner can outline (tens to a few hundred meters).

use geo::{Coord, LineString, SimplifyIdx};

use crate::LocationModel;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude used by the planar projection.
pub const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Great-circle distance between two samples in meters.
///
/// # Example
/// ```
/// use turfcore::LocationModel;
/// use turfcore::geo_utils::haversine_distance;
///
/// let london = LocationModel::new(51.5074, -0.1278);
/// let paris = LocationModel::new(48.8566, 2.3522);
/// let km = haversine_distance(&london, &paris) / 1000.0;
/// assert!((km - 343.5).abs() < 1.0);
/// ```
pub fn haversine_distance(a: &LocationModel, b: &LocationModel) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Total length of a path: the sum of consecutive-pair distances.
pub fn path_distance(points: &[LocationModel]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance(&pair[0], &pair[1]))
        .sum()
}

/// Meters per degree of longitude at the given latitude.
#[inline]
pub fn meters_per_deg_lon(latitude: f64) -> f64 {
    METERS_PER_DEG_LAT * latitude.to_radians().cos()
}

/// Approximate area of a closed ring in square meters.
///
/// The ring must not repeat its first point at the end. Fewer than 3 points
/// yields 0. Self-intersecting rings are not corrected.
pub fn polygon_area(points: &[LocationModel]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let mean_lat = points.iter().map(|p| p.latitude).sum::<f64>() / points.len() as f64;
    let m_lon = meters_per_deg_lon(mean_lat);

    // Offsets from the first vertex keep the products small
    let origin = points[0];
    let projected: Vec<(f64, f64)> = points
        .iter()
        .map(|p| {
            (
                (p.longitude - origin.longitude) * m_lon,
                (p.latitude - origin.latitude) * METERS_PER_DEG_LAT,
            )
        })
        .collect();

    let n = projected.len();
    let twice_area: f64 = (0..n)
        .map(|i| {
            let (x1, y1) = projected[i];
            let (x2, y2) = projected[(i + 1) % n];
            x1 * y2 - x2 * y1
        })
        .sum();

    twice_area.abs() / 2.0
}

/// Ray-casting point-in-polygon test against an open ring.
///
/// Points exactly on an edge may fall either way.
pub fn point_in_polygon(latitude: f64, longitude: f64, ring: &[LocationModel]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (yi, xi) = (ring[i].latitude, ring[i].longitude);
        let (yj, xj) = (ring[j].latitude, ring[j].longitude);

        if (yi > latitude) != (yj > latitude)
            && longitude < (xj - xi) * (latitude - yi) / (yj - yi) + xi
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Convert a distance in meters to (lat, lon) degree offsets at a latitude.
pub fn meters_to_degrees(meters: f64, latitude: f64) -> (f64, f64) {
    let dlat = meters / METERS_PER_DEG_LAT;
    let m_lon = meters_per_deg_lon(latitude);
    let dlon = if m_lon.abs() < f64::EPSILON {
        0.0
    } else {
        meters / m_lon
    };
    (dlat, dlon)
}

/// Douglas-Peucker simplification that keeps the original samples.
///
/// `tolerance_m` is converted to degrees at the first sample's latitude,
/// taking the smaller of the two axis offsets. Altitude, accuracy and
/// timestamps of the kept samples are preserved.
pub fn simplify_path(points: &[LocationModel], tolerance_m: f64) -> Vec<LocationModel> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let (dlat, dlon) = meters_to_degrees(tolerance_m, points[0].latitude);
    let tolerance = dlat.min(dlon);

    let line: LineString<f64> = points
        .iter()
        .map(|p| Coord {
            x: p.longitude,
            y: p.latitude,
        })
        .collect();

    line.simplify_idx(&tolerance)
        .into_iter()
        .map(|i| points[i])
        .collect()
}
