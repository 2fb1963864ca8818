//! # Territory Grid
//!
//! The world is divided into fixed-size lat/lon cells. Capturing an area
//! claims every cell whose center lies inside the capture polygon.
//!
//! ## Ownership
//!
//! A cell has at most one owner. Ownership is whatever was written last:
//! there is no versioning or conflict detection, so two runners capturing
//! overlapping polygons at the same time race and the later write wins.
//! [`resolve_ownership`] applies the same rule to an ordered list of writes.
//!
//! ## Example
//! ```rust
//! use turfcore::{LocationModel, TerritoryGrid};
//!
//! let grid = TerritoryGrid::default();
//! let square = vec![
//!     LocationModel::new(51.5000, -0.1200),
//!     LocationModel::new(51.5000, -0.1180),
//!     LocationModel::new(51.5020, -0.1180),
//!     LocationModel::new(51.5020, -0.1200),
//! ];
//! let cells = grid.claim("runner-1", &square);
//! assert!(!cells.is_empty());
//! ```

use std::collections::{BTreeMap, HashMap};

use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{Result, TurfError};
use crate::{Bounds, LocationModel, geo_utils};

/// Default cell side in degrees (about 33m at the equator).
pub const DEFAULT_CELL_SIZE_DEG: f64 = 0.0003;

/// Default cap on bounding-box cells a single claim may enumerate
/// (roughly 100 km² with the default cell size).
pub const DEFAULT_MAX_CLAIM_CELLS: u64 = 100_000;

/// Integer grid coordinates of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellIndex {
    pub lat_idx: i64,
    pub lon_idx: i64,
}

/// Ownership record for one cell, as stored in the shared store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerritoryCell {
    pub owner_uid: String,
    pub lat_idx: i64,
    pub lon_idx: i64,
}

impl TerritoryCell {
    pub fn new(owner_uid: impl Into<String>, index: CellIndex) -> Self {
        Self {
            owner_uid: owner_uid.into(),
            lat_idx: index.lat_idx,
            lon_idx: index.lon_idx,
        }
    }

    pub fn index(&self) -> CellIndex {
        CellIndex {
            lat_idx: self.lat_idx,
            lon_idx: self.lon_idx,
        }
    }
}

/// Fixed-size lat/lon grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerritoryGrid {
    /// Cell side length in degrees
    pub cell_size: f64,
}

impl Default for TerritoryGrid {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE_DEG,
        }
    }
}

impl TerritoryGrid {
    pub fn new(cell_size: f64) -> Self {
        Self { cell_size }
    }

    /// Cell containing the coordinate.
    pub fn cell_index(&self, latitude: f64, longitude: f64) -> CellIndex {
        CellIndex {
            lat_idx: (latitude / self.cell_size).floor() as i64,
            lon_idx: (longitude / self.cell_size).floor() as i64,
        }
    }

    /// Center point of a cell.
    pub fn cell_center(&self, index: CellIndex) -> LocationModel {
        LocationModel::new(
            (index.lat_idx as f64 + 0.5) * self.cell_size,
            (index.lon_idx as f64 + 0.5) * self.cell_size,
        )
    }

    /// Bounds of a cell in degrees.
    pub fn cell_bounds(&self, index: CellIndex) -> Bounds {
        let min_lat = index.lat_idx as f64 * self.cell_size;
        let min_lng = index.lon_idx as f64 * self.cell_size;
        Bounds {
            min_lat,
            max_lat: min_lat + self.cell_size,
            min_lng,
            max_lng: min_lng + self.cell_size,
        }
    }

    /// Axis-aligned quadrilateral of a cell, counter-clockwise from the
    /// south-west corner, suitable for a map renderer.
    pub fn cell_polygon(&self, index: CellIndex) -> Vec<LocationModel> {
        let b = self.cell_bounds(index);
        vec![
            LocationModel::new(b.min_lat, b.min_lng),
            LocationModel::new(b.min_lat, b.max_lng),
            LocationModel::new(b.max_lat, b.max_lng),
            LocationModel::new(b.max_lat, b.min_lng),
        ]
    }

    /// Approximate area of a cell in square meters.
    pub fn cell_area(&self, index: CellIndex) -> f64 {
        geo_utils::polygon_area(&self.cell_polygon(index))
    }

    /// Number of cells in the polygon's bounding box. This is the number of
    /// point-in-polygon tests `cells_for_polygon` would run.
    pub fn candidate_cell_count(&self, polygon: &[LocationModel]) -> u64 {
        if polygon.len() < 3 || polygon.iter().any(|p| !p.is_valid()) {
            return 0;
        }
        let Some(bounds) = Bounds::from_points(polygon) else {
            return 0;
        };
        let min = self.cell_index(bounds.min_lat, bounds.min_lng);
        let max = self.cell_index(bounds.max_lat, bounds.max_lng);

        // i128 so degenerate cell sizes cannot overflow the span
        let span =
            |lo: i64, hi: i64| u64::try_from(hi as i128 - lo as i128 + 1).unwrap_or(u64::MAX);
        span(min.lat_idx, max.lat_idx).saturating_mul(span(min.lon_idx, max.lon_idx))
    }

    /// Cells whose centers fall inside the polygon, in row-major order.
    ///
    /// Polygons with fewer than 3 valid points enclose nothing.
    pub fn cells_for_polygon(&self, polygon: &[LocationModel]) -> Vec<CellIndex> {
        if polygon.len() < 3 || polygon.iter().any(|p| !p.is_valid()) {
            return Vec::new();
        }
        let Some(bounds) = Bounds::from_points(polygon) else {
            return Vec::new();
        };

        let min = self.cell_index(bounds.min_lat, bounds.min_lng);
        let max = self.cell_index(bounds.max_lat, bounds.max_lng);

        #[cfg(feature = "parallel")]
        let cells: Vec<CellIndex> = (min.lat_idx..=max.lat_idx)
            .into_par_iter()
            .flat_map_iter(|lat_idx| self.row_cells(lat_idx, min.lon_idx, max.lon_idx, polygon))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let cells: Vec<CellIndex> = (min.lat_idx..=max.lat_idx)
            .flat_map(|lat_idx| self.row_cells(lat_idx, min.lon_idx, max.lon_idx, polygon))
            .collect();

        log::debug!(
            "[TerritoryGrid] {} candidate rows, {} cells inside polygon",
            max.lat_idx - min.lat_idx + 1,
            cells.len()
        );
        cells
    }

    fn row_cells(
        &self,
        lat_idx: i64,
        min_lon_idx: i64,
        max_lon_idx: i64,
        polygon: &[LocationModel],
    ) -> Vec<CellIndex> {
        (min_lon_idx..=max_lon_idx)
            .map(|lon_idx| CellIndex { lat_idx, lon_idx })
            .filter(|&index| {
                let c = self.cell_center(index);
                geo_utils::point_in_polygon(c.latitude, c.longitude, polygon)
            })
            .collect()
    }

    /// Ownership records for every cell a capture polygon covers.
    pub fn claim(&self, owner_uid: &str, polygon: &[LocationModel]) -> Vec<TerritoryCell> {
        self.cells_for_polygon(polygon)
            .into_iter()
            .map(|index| TerritoryCell::new(owner_uid, index))
            .collect()
    }

    /// Like [`claim`](Self::claim), but refuses polygons whose bounding box
    /// holds more than `max_cells` cells before enumerating any of them.
    pub fn claim_within(
        &self,
        owner_uid: &str,
        polygon: &[LocationModel],
        max_cells: u64,
    ) -> Result<Vec<TerritoryCell>> {
        let candidate_cells = self.candidate_cell_count(polygon);
        if candidate_cells > max_cells {
            return Err(TurfError::ClaimTooLarge {
                candidate_cells,
                limit: max_cells,
            });
        }
        Ok(self.claim(owner_uid, polygon))
    }
}

/// Apply an ordered list of writes; the last write to each cell wins.
pub fn resolve_ownership<I>(writes: I) -> Vec<TerritoryCell>
where
    I: IntoIterator<Item = TerritoryCell>,
{
    let mut owners: BTreeMap<CellIndex, String> = BTreeMap::new();
    for cell in writes {
        owners.insert(cell.index(), cell.owner_uid);
    }
    owners
        .into_iter()
        .map(|(index, owner)| TerritoryCell::new(owner, index))
        .collect()
}

/// All territory held by one owner, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerTerritory {
    pub owner_uid: String,
    pub cells: Vec<CellIndex>,
    /// One quadrilateral per cell
    pub polygons: Vec<Vec<LocationModel>>,
    pub cell_count: u32,
    /// Sum of cell areas in square meters
    pub total_area_m2: f64,
}

/// Group cells by owner and compute display polygons and total area.
///
/// Owners are returned sorted by uid.
pub fn summarize_territory(grid: &TerritoryGrid, cells: &[TerritoryCell]) -> Vec<OwnerTerritory> {
    let resolved = resolve_ownership(cells.iter().cloned());

    let mut by_owner: BTreeMap<String, Vec<CellIndex>> = BTreeMap::new();
    for cell in &resolved {
        by_owner
            .entry(cell.owner_uid.clone())
            .or_default()
            .push(cell.index());
    }

    by_owner
        .into_iter()
        .map(|(owner_uid, cells)| {
            let polygons: Vec<Vec<LocationModel>> =
                cells.iter().map(|&c| grid.cell_polygon(c)).collect();
            let total_area_m2 = cells.iter().map(|&c| grid.cell_area(c)).sum();
            OwnerTerritory {
                owner_uid,
                cell_count: cells.len() as u32,
                cells,
                polygons,
                total_area_m2,
            }
        })
        .collect()
}

// ============================================================================
// Spatial Index
// ============================================================================

/// Cell wrapper for R-tree spatial indexing.
#[derive(Debug, Clone)]
struct CellEntry {
    cell: TerritoryCell,
    bounds: Bounds,
}

impl RTreeObject for CellEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds.min_lng, self.bounds.min_lat],
            [self.bounds.max_lng, self.bounds.max_lat],
        )
    }
}

/// In-memory index over owned cells for viewport and point lookups.
pub struct TerritoryIndex {
    grid: TerritoryGrid,
    tree: RTree<CellEntry>,
    owners: HashMap<CellIndex, String>,
}

impl TerritoryIndex {
    /// Build an index from stored cells (last write wins on duplicates).
    pub fn build(grid: TerritoryGrid, cells: &[TerritoryCell]) -> Self {
        let resolved = resolve_ownership(cells.iter().cloned());
        let owners = resolved
            .iter()
            .map(|c| (c.index(), c.owner_uid.clone()))
            .collect();
        let entries: Vec<CellEntry> = resolved
            .into_iter()
            .map(|cell| CellEntry {
                bounds: grid.cell_bounds(cell.index()),
                cell,
            })
            .collect();

        Self {
            grid,
            tree: RTree::bulk_load(entries),
            owners,
        }
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Cells intersecting a viewport.
    pub fn query_viewport(&self, viewport: &Bounds) -> Vec<&TerritoryCell> {
        let envelope = AABB::from_corners(
            [viewport.min_lng, viewport.min_lat],
            [viewport.max_lng, viewport.max_lat],
        );
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| &entry.cell)
            .collect()
    }

    /// Owner of the cell containing a coordinate.
    pub fn owner_at(&self, latitude: f64, longitude: f64) -> Option<&str> {
        self.owners
            .get(&self.grid.cell_index(latitude, longitude))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(lat: f64, lon: f64, side: f64) -> Vec<LocationModel> {
        vec![
            LocationModel::new(lat, lon),
            LocationModel::new(lat, lon + side),
            LocationModel::new(lat + side, lon + side),
            LocationModel::new(lat + side, lon),
        ]
    }

    #[test]
    fn test_cell_index_floor() {
        let grid = TerritoryGrid::default();
        assert_eq!(
            grid.cell_index(0.00045, 0.00015),
            CellIndex {
                lat_idx: 1,
                lon_idx: 0
            }
        );
        // Negative coordinates floor away from zero
        assert_eq!(
            grid.cell_index(-0.0001, -0.0001),
            CellIndex {
                lat_idx: -1,
                lon_idx: -1
            }
        );
    }

    #[test]
    fn test_cell_center_round_trips_to_index() {
        let grid = TerritoryGrid::default();
        let index = CellIndex {
            lat_idx: 171_666,
            lon_idx: -400,
        };
        let c = grid.cell_center(index);
        assert_eq!(grid.cell_index(c.latitude, c.longitude), index);
    }

    #[test]
    fn test_cells_for_aligned_square() {
        // Square covering exactly 3x3 cells
        let grid = TerritoryGrid::new(0.001);
        let polygon = square(0.0, 0.0, 0.003);
        let cells = grid.cells_for_polygon(&polygon);
        assert_eq!(cells.len(), 9);
        assert_eq!(
            cells[0],
            CellIndex {
                lat_idx: 0,
                lon_idx: 0
            }
        );
        assert_eq!(
            cells[8],
            CellIndex {
                lat_idx: 2,
                lon_idx: 2
            }
        );
    }

    #[test]
    fn test_cells_for_triangle_excludes_outside_centers() {
        let grid = TerritoryGrid::new(0.001);
        // Right triangle over a 4x4 block; the diagonal cuts centers off
        let polygon = vec![
            LocationModel::new(0.0, 0.0),
            LocationModel::new(0.0, 0.0039),
            LocationModel::new(0.0039, 0.0),
        ];
        let cells = grid.cells_for_polygon(&polygon);
        // Centers (i+0.5, j+0.5) inside when i + j + 1 < 3.9
        assert_eq!(cells.len(), 6);
        assert!(cells.iter().all(|c| c.lat_idx + c.lon_idx <= 2));
    }

    #[test]
    fn test_small_polygon_claims_nothing() {
        let grid = TerritoryGrid::default();
        assert!(grid.cells_for_polygon(&[]).is_empty());
        let two = vec![LocationModel::new(0.0, 0.0), LocationModel::new(0.1, 0.1)];
        assert!(grid.cells_for_polygon(&two).is_empty());
    }

    #[test]
    fn test_claim_sets_owner() {
        let grid = TerritoryGrid::new(0.001);
        let cells = grid.claim("alice", &square(0.0, 0.0, 0.002));
        assert_eq!(cells.len(), 4);
        assert!(cells.iter().all(|c| c.owner_uid == "alice"));
    }

    #[test]
    fn test_candidate_count_is_bounding_box() {
        let grid = TerritoryGrid::new(0.001);
        // Max corner lands on the next row and column
        assert_eq!(grid.candidate_cell_count(&square(0.0, 0.0, 0.003)), 16);
        assert_eq!(grid.candidate_cell_count(&[]), 0);
    }

    #[test]
    fn test_claim_within_rejects_oversized_polygon() {
        let grid = TerritoryGrid::default();
        // Half a degree square holds millions of default cells
        let huge = square(51.0, -0.5, 0.5);
        let err = grid
            .claim_within("alice", &huge, DEFAULT_MAX_CLAIM_CELLS)
            .unwrap_err();
        match err {
            TurfError::ClaimTooLarge {
                candidate_cells,
                limit,
            } => {
                assert!(candidate_cells > 2_000_000);
                assert_eq!(limit, DEFAULT_MAX_CLAIM_CELLS);
            }
            other => panic!("unexpected error {:?}", other),
        }

        let block = square(51.50001, -0.12001, 0.0015);
        let cells = grid
            .claim_within("alice", &block, DEFAULT_MAX_CLAIM_CELLS)
            .unwrap();
        assert_eq!(cells.len(), 25);
        assert!(grid.claim_within("alice", &block, 10).is_err());
    }

    #[test]
    fn test_last_write_wins() {
        let grid = TerritoryGrid::new(0.001);
        let mut writes = grid.claim("alice", &square(0.0, 0.0, 0.002));
        writes.extend(grid.claim("bob", &square(0.001, 0.001, 0.002)));

        let resolved = resolve_ownership(writes);
        // 4 + 4 cells with one overlapping cell
        assert_eq!(resolved.len(), 7);
        let overlap = resolved
            .iter()
            .find(|c| c.lat_idx == 1 && c.lon_idx == 1)
            .unwrap();
        assert_eq!(overlap.owner_uid, "bob");
    }

    #[test]
    fn test_summarize_territory() {
        let grid = TerritoryGrid::new(0.001);
        let mut cells = grid.claim("alice", &square(0.0, 0.0, 0.002));
        cells.extend(grid.claim("bob", &square(0.010, 0.010, 0.001)));

        let summary = summarize_territory(&grid, &cells);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].owner_uid, "alice");
        assert_eq!(summary[0].cell_count, 4);
        assert_eq!(summary[0].polygons.len(), 4);
        assert_eq!(summary[0].polygons[0].len(), 4);
        assert_eq!(summary[1].owner_uid, "bob");
        assert_eq!(summary[1].cell_count, 1);

        let one_cell = grid.cell_area(CellIndex {
            lat_idx: 0,
            lon_idx: 0,
        });
        assert!((summary[0].total_area_m2 - 4.0 * one_cell).abs() < 1.0);
        assert!(one_cell > 12_000.0 && one_cell < 12_500.0);
    }

    #[test]
    fn test_territory_index_viewport_and_owner() {
        let grid = TerritoryGrid::new(0.001);
        let mut cells = grid.claim("alice", &square(0.0, 0.0, 0.002));
        cells.extend(grid.claim("bob", &square(1.0, 1.0, 0.001)));

        let index = TerritoryIndex::build(grid, &cells);
        assert_eq!(index.len(), 5);

        let near_origin = index.query_viewport(&Bounds {
            min_lat: -0.01,
            max_lat: 0.01,
            min_lng: -0.01,
            max_lng: 0.01,
        });
        assert_eq!(near_origin.len(), 4);
        assert!(near_origin.iter().all(|c| c.owner_uid == "alice"));

        assert_eq!(index.owner_at(1.0005, 1.0005), Some("bob"));
        assert_eq!(index.owner_at(5.0, 5.0), None);
    }
}
