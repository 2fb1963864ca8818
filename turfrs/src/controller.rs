//! # Run Controller
//!
//! Single owner of the live [`RunTracker`]. Platform callbacks (location
//! samples, button taps, timer ticks) all go through here, so updates to a
//! session are serialized by one mutex. After every update the full
//! snapshot is published on a `tokio::sync::watch` channel; observers only
//! ever see whole snapshots.
//!
//! Territory claims are slow (cell enumeration plus a store write) and run
//! on a background thread. The result is applied back through the same
//! mutex and published as a new snapshot.

use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};
use tokio::sync::watch;
use turfcore::{
    AreaModel, ClaimSummary, LocationModel, RunScreenState, RunSession, RunTracker, RunUiState,
};

use crate::clock::Clock;
use crate::error::AppResult;
use crate::repository::{RunRepository, TerritoryRepository};

pub const LOCATION_PERMISSION_MESSAGE: &str = "Location permission is needed to track your run";

/// Handle for a background territory claim.
pub struct ClaimHandle {
    /// The captured area being claimed
    pub area: AreaModel,
    receiver: mpsc::Receiver<AppResult<ClaimSummary>>,
}

impl ClaimHandle {
    /// Check if the claim is complete (non-blocking).
    pub fn try_recv(&self) -> Option<AppResult<ClaimSummary>> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the claim to complete (blocking).
    pub fn recv(self) -> Option<AppResult<ClaimSummary>> {
        self.receiver.recv().ok()
    }
}

struct Shared {
    uid: String,
    tracker: Mutex<RunTracker>,
    state_tx: watch::Sender<RunUiState>,
    runs: RunRepository,
    territory: TerritoryRepository,
    clock: Arc<dyn Clock>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RunTracker> {
        self.tracker.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a change and publish the resulting snapshot.
    fn update<R>(&self, f: impl FnOnce(&mut RunTracker, i64) -> R) -> R {
        let now = self.clock.now_ms();
        let mut tracker = self.lock();
        let result = f(&mut tracker, now);
        let next = tracker.state();
        self.state_tx.send_if_modified(|current| {
            if current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
        result
    }
}

/// Cloneable handle to the live run state.
#[derive(Clone)]
pub struct RunController {
    shared: Arc<Shared>,
}

impl RunController {
    pub fn new(
        uid: impl Into<String>,
        tracker: RunTracker,
        runs: RunRepository,
        territory: TerritoryRepository,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state_tx, _) = watch::channel(tracker.state().clone());
        Self {
            shared: Arc::new(Shared {
                uid: uid.into(),
                tracker: Mutex::new(tracker),
                state_tx,
                runs,
                territory,
                clock,
            }),
        }
    }

    pub fn uid(&self) -> &str {
        &self.shared.uid
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<RunUiState> {
        self.shared.state_tx.subscribe()
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> RunUiState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn screen(&self) -> RunScreenState {
        self.shared.state_tx.borrow().screen
    }

    // ========================================================================
    // Run transitions
    // ========================================================================

    /// Start a new session. Returns its id, or `None` if not ready to start.
    pub fn start_tracking(&self) -> Option<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let started = self.shared.update(|t, now| t.start_tracking(&session_id, now));
        if started {
            info!("[RunController] Started run {}", session_id);
        }
        started.then_some(session_id)
    }

    pub fn pause_tracking(&self) -> bool {
        self.shared.update(|t, _| t.pause_tracking())
    }

    pub fn resume_tracking(&self) -> bool {
        self.shared.update(|t, _| t.resume_tracking())
    }

    pub fn show_map_in_paused(&self) -> bool {
        self.shared.update(|t, _| t.show_map_in_paused())
    }

    pub fn hide_map_in_paused(&self) -> bool {
        self.shared.update(|t, _| t.hide_map_in_paused())
    }

    /// Finish the run, persist it once, and move to the summary.
    pub fn finish_run(&self) -> Option<RunSession> {
        let session = self.shared.update(|t, now| t.finish_run(now))?;
        info!(
            "[RunController] Finished run {}: {:.0} m, {} points",
            session.id,
            session.distance,
            session.path.len()
        );
        self.persist(&session);
        Some(session)
    }

    /// Abandon the run. Sessions with at least one sample are still kept.
    pub fn stop_tracking(&self) -> Option<RunSession> {
        let session = self.shared.update(|t, now| t.stop_tracking(now))?;
        if session.path.is_empty() {
            debug!("[RunController] Discarded empty run {}", session.id);
        } else {
            self.persist(&session);
        }
        Some(session)
    }

    fn persist(&self, session: &RunSession) {
        if let Err(e) = self.shared.runs.save(&self.shared.uid, session) {
            warn!("[RunController] Failed to save run {}: {}", session.id, e);
            let message = e.user_message();
            self.shared.update(|t, _| t.show_message(message));
        }
    }

    pub fn show_maps(&self) -> bool {
        self.shared.update(|t, _| t.show_maps())
    }

    pub fn reset(&self) -> bool {
        self.shared.update(|t, _| t.reset())
    }

    // ========================================================================
    // Platform callbacks
    // ========================================================================

    /// Feed a sample from the location provider. Dropped unless running.
    pub fn on_location_update(&self, location: LocationModel) -> bool {
        self.shared.update(|t, now| t.on_location_update(location, now))
    }

    /// Feed recorded or simulated samples, using each sample's own
    /// timestamp as the clock. Returns how many were accepted.
    pub fn replay(&self, samples: &[LocationModel]) -> usize {
        self.shared.update(|t, _| {
            samples
                .iter()
                .filter(|s| t.on_location_update(**s, s.timestamp))
                .count()
        })
    }

    pub fn on_location_permission_denied(&self) {
        warn!("[RunController] Location permission denied");
        self.shared
            .update(|t, _| t.show_message(LOCATION_PERMISSION_MESSAGE));
    }

    /// Refresh duration and pace from the wall clock.
    pub fn tick(&self) -> bool {
        self.shared.update(|t, now| t.tick(now))
    }

    pub fn show_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.shared.update(|t, _| t.show_message(message));
    }

    pub fn dismiss_message(&self) -> bool {
        self.shared.update(|t, _| t.dismiss_message())
    }

    // ========================================================================
    // Area capture
    // ========================================================================

    pub fn start_area_capture(&self) -> bool {
        self.shared.update(|t, _| t.start_area_capture())
    }

    pub fn add_capture_point(&self, point: LocationModel) -> bool {
        self.shared.update(|t, _| t.add_capture_point(point))
    }

    pub fn undo_capture_point(&self) -> bool {
        self.shared.update(|t, _| t.undo_capture_point())
    }

    pub fn cancel_area_capture(&self) -> bool {
        self.shared.update(|t, _| t.cancel_area_capture())
    }

    /// Close the capture and claim its cells in the background.
    ///
    /// Returns `None` when the capture could not be finished; the snapshot
    /// then carries a message explaining why. A capture spanning more cells
    /// than one claim may write stays open so points can be undone.
    pub fn finish_area_capture(&self) -> Option<ClaimHandle> {
        let territory = &self.shared.territory;
        let area = self.shared.update(|t, _| {
            let rejected = t
                .state()
                .capture
                .as_ref()
                .and_then(|c| territory.check_claim_size(c.points()).err());
            if let Some(e) = rejected {
                warn!("[RunController] Rejected capture: {}", e);
                t.show_message(e.user_message());
                return None;
            }
            t.finish_area_capture()
        })?;
        info!(
            "[RunController] Captured area of {:.0} m² with {} vertices",
            area.area,
            area.polygon.len()
        );

        let (tx, rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let polygon = area.clone();

        std::thread::spawn(move || {
            let result = shared.territory.claim_area(&shared.uid, &polygon);
            match &result {
                Ok(summary) => {
                    let summary = *summary;
                    shared.update(|t, _| t.territory_claimed(summary));
                }
                Err(e) => {
                    warn!("[RunController] Territory claim failed: {}", e);
                    let message = e.user_message();
                    shared.update(|t, _| t.show_message(message));
                }
            }
            let _ = tx.send(result);
        });

        Some(ClaimHandle { area, receiver: rx })
    }
}
