use std::sync::Arc;

use log::info;
use turfcore::{
    AreaModel, ClaimSummary, DEFAULT_MAX_CLAIM_CELLS, LocationModel, OwnerTerritory,
    TerritoryCell, TerritoryGrid, TerritoryIndex, TurfError, summarize_territory,
};

use crate::error::AppResult;
use crate::store::RemoteStore;

#[derive(Clone)]
pub struct TerritoryRepository {
    store: Arc<dyn RemoteStore>,
    grid: TerritoryGrid,
    max_claim_cells: u64,
}

impl TerritoryRepository {
    pub fn new(store: Arc<dyn RemoteStore>, grid: TerritoryGrid) -> Self {
        Self {
            store,
            grid,
            max_claim_cells: DEFAULT_MAX_CLAIM_CELLS,
        }
    }

    pub fn with_max_claim_cells(mut self, max_claim_cells: u64) -> Self {
        self.max_claim_cells = max_claim_cells;
        self
    }

    pub fn grid(&self) -> TerritoryGrid {
        self.grid
    }

    /// Fail with [`TurfError::ClaimTooLarge`] if
    /// `polygon` spans more cells than one claim may write.
    pub fn check_claim_size(&self, polygon: &[LocationModel]) -> AppResult<()> {
        let candidate_cells = self.grid.candidate_cell_count(polygon);
        if candidate_cells > self.max_claim_cells {
            return Err(TurfError::ClaimTooLarge {
                candidate_cells,
                limit: self.max_claim_cells,
            }
            .into());
        }
        Ok(())
    }

    /// Write one ownership record per cell whose center lies in `polygon`.
    pub fn claim(
        &self,
        owner_uid: &str,
        polygon: &[LocationModel],
    ) -> AppResult<Vec<TerritoryCell>> {
        let cells = self.grid.claim_within(owner_uid, polygon, self.max_claim_cells)?;
        if !cells.is_empty() {
            self.store.upsert_cells(&cells)?;
        }
        info!(
            "[TerritoryRepository] {} claimed {} cells",
            owner_uid,
            cells.len()
        );
        Ok(cells)
    }

    pub fn claim_area(&self, owner_uid: &str, area: &AreaModel) -> AppResult<ClaimSummary> {
        let cells = self.claim(owner_uid, &area.polygon)?;
        let area_m2 = cells.iter().map(|c| self.grid.cell_area(c.index())).sum();
        Ok(ClaimSummary {
            cells_claimed: cells.len() as u32,
            area_m2,
        })
    }

    /// Every owner's territory, sorted by uid.
    pub fn all_territory(&self) -> AppResult<Vec<OwnerTerritory>> {
        let cells = self.store.all_cells()?;
        Ok(summarize_territory(&self.grid, &cells))
    }

    pub fn territory_for(&self, uid: &str) -> AppResult<Option<OwnerTerritory>> {
        let cells = self.store.cells_for_owner(uid)?;
        Ok(summarize_territory(&self.grid, &cells).into_iter().next())
    }

    /// Total owned area in square meters.
    pub fn total_area(&self, uid: &str) -> AppResult<f64> {
        Ok(self.territory_for(uid)?.map_or(0.0, |t| t.total_area_m2))
    }

    /// Spatial index over all cells for viewport queries.
    pub fn index(&self) -> AppResult<TerritoryIndex> {
        let cells = self.store.all_cells()?;
        Ok(TerritoryIndex::build(self.grid, &cells))
    }
}
