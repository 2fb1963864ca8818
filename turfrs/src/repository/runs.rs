use std::sync::Arc;

use log::info;
use turfcore::{RunSession, TurfError};

use crate::error::AppResult;
use crate::store::RemoteStore;

#[derive(Clone)]
pub struct RunRepository {
    store: Arc<dyn RemoteStore>,
}

impl RunRepository {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Persist a finalized run.
    pub fn save(&self, uid: &str, run: &RunSession) -> AppResult<()> {
        if run.is_active {
            return Err(TurfError::validation("run", "still active").into());
        }
        self.store.save_run(uid, run)?;
        info!(
            "[RunRepository] Saved run {} for {}: {:.0} m in {} ms",
            run.id, uid, run.distance, run.duration
        );
        Ok(())
    }

    pub fn get(&self, run_id: &str) -> AppResult<Option<RunSession>> {
        self.store.get_run(run_id)
    }

    /// Runs for a user, newest first.
    pub fn list(&self, uid: &str) -> AppResult<Vec<RunSession>> {
        self.store.list_runs(uid)
    }

    pub fn delete(&self, run_id: &str) -> AppResult<bool> {
        self.store.delete_run(run_id)
    }

    /// Total distance (m) and number of runs for a user.
    pub fn totals(&self, uid: &str) -> AppResult<(f64, u32)> {
        let runs = self.list(uid)?;
        let distance = runs.iter().map(|r| r.distance).sum();
        Ok((distance, runs.len() as u32))
    }
}
