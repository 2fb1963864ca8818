//! # Run State Machine
//!
//! The run flow moves through explicit screen states:
//!
//! ```text
//! READY_TO_START -> RUNNING -> PAUSED_WITH_OVERLAY <-> PAUSED_WITH_MAP
//!                      |              |                    |
//!                      +--------------+--------------------+--> SUMMARY -> MAPS
//!                      +--------------+--------------------+--> READY_TO_START (stop)
//! ```
//!
//! Every change is an event passed to [`reduce`], which returns a new
//! [`RunUiState`] snapshot and never mutates the old one. Events that do not
//! apply to the current screen return an unchanged copy. There are no error
//! states: failures from collaborators surface as a transient `message`.
//!
//! [`RunTracker`] owns the current snapshot and exposes one method per
//! transition.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    AreaCalculator, AreaCapture, AreaModel, LocationModel, PlanarAreaCalculator, RunSession,
    RunStats, SessionConfig,
};

/// Which overlay is shown on top of the persistent map view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunScreenState {
    #[default]
    ReadyToStart,
    Running,
    PausedWithOverlay,
    PausedWithMap,
    Summary,
    Maps,
}

impl RunScreenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunScreenState::ReadyToStart => "READY_TO_START",
            RunScreenState::Running => "RUNNING",
            RunScreenState::PausedWithOverlay => "PAUSED_WITH_OVERLAY",
            RunScreenState::PausedWithMap => "PAUSED_WITH_MAP",
            RunScreenState::Summary => "SUMMARY",
            RunScreenState::Maps => "MAPS",
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(
            self,
            RunScreenState::PausedWithOverlay | RunScreenState::PausedWithMap
        )
    }

    /// Running or paused: a session is open.
    pub fn is_tracking(&self) -> bool {
        *self == RunScreenState::Running || self.is_paused()
    }
}

/// Result of writing a captured area to the territory grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSummary {
    pub cells_claimed: u32,
    pub area_m2: f64,
}

/// Immutable snapshot observed by the UI.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunUiState {
    pub screen: RunScreenState,
    pub session: Option<RunSession>,
    /// Last accepted sample
    pub last_location: Option<LocationModel>,
    /// In-progress capture polygon, if capturing
    pub capture: Option<AreaCapture>,
    /// Areas captured while no session was active
    pub captured_areas: Vec<AreaModel>,
    /// Transient user-facing message
    pub message: Option<String>,
    pub last_claim: Option<ClaimSummary>,
}

impl RunUiState {
    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    pub fn distance(&self) -> f64 {
        self.session.as_ref().map_or(0.0, |s| s.distance)
    }

    pub fn duration(&self) -> i64 {
        self.session.as_ref().map_or(0, |s| s.duration)
    }

    pub fn pace(&self) -> &str {
        self.session
            .as_ref()
            .map_or(crate::PLACEHOLDER_PACE, |s| s.average_pace.as_str())
    }

    /// Display figures for the current or just-finished run.
    pub fn stats(&self) -> Option<RunStats> {
        self.session.as_ref().map(RunSession::stats)
    }

    /// Every area captured in this UI session, session areas first.
    pub fn all_areas(&self) -> impl Iterator<Item = &AreaModel> {
        self.session
            .iter()
            .flat_map(|s| s.captured_areas.iter())
            .chain(self.captured_areas.iter())
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    StartTracking { session_id: String, now: i64 },
    PauseTracking,
    ResumeTracking,
    ShowMapInPaused,
    HideMapInPaused,
    FinishRun { now: i64 },
    StopTracking,
    ShowMaps,
    Reset,
    LocationUpdated { location: LocationModel, now: i64 },
    Tick { now: i64 },
    StartAreaCapture,
    AddCapturePoint(LocationModel),
    UndoCapturePoint,
    FinishAreaCapture,
    CancelAreaCapture,
    TerritoryClaimed(ClaimSummary),
    ShowMessage(String),
    DismissMessage,
}

/// Apply one event to a snapshot, producing the next snapshot.
pub fn reduce(
    state: &RunUiState,
    event: RunEvent,
    calculator: &dyn AreaCalculator,
    config: &SessionConfig,
) -> RunUiState {
    use RunScreenState::*;

    let mut next = state.clone();
    match event {
        RunEvent::StartTracking { session_id, now } => {
            if state.screen == ReadyToStart {
                next.screen = Running;
                next.session = Some(RunSession::start(session_id, now));
                next.last_claim = None;
            }
        }
        RunEvent::PauseTracking => {
            if state.screen == Running {
                next.screen = PausedWithOverlay;
            }
        }
        RunEvent::ResumeTracking => {
            if state.screen.is_paused() {
                next.screen = Running;
            }
        }
        RunEvent::ShowMapInPaused => {
            if state.screen == PausedWithOverlay {
                next.screen = PausedWithMap;
            }
        }
        RunEvent::HideMapInPaused => {
            if state.screen == PausedWithMap {
                next.screen = PausedWithOverlay;
            }
        }
        RunEvent::FinishRun { now } => {
            if state.screen.is_tracking() {
                next.screen = Summary;
                next.capture = None;
                if let Some(session) = next.session.as_mut() {
                    session.finish(now);
                }
            }
        }
        RunEvent::StopTracking => {
            if state.screen.is_tracking() {
                next.screen = ReadyToStart;
                next.session = None;
                next.last_location = None;
                next.capture = None;
                next.last_claim = None;
            }
        }
        RunEvent::ShowMaps => {
            if state.screen == Summary {
                next.screen = Maps;
            }
        }
        RunEvent::Reset => {
            if matches!(state.screen, Summary | Maps) {
                next.screen = ReadyToStart;
                next.session = None;
                next.last_location = None;
                next.capture = None;
                next.last_claim = None;
            }
        }
        RunEvent::LocationUpdated { location, now } => {
            if state.screen == Running {
                if let Some(session) = next.session.as_mut() {
                    if session.record_location(location, now, config) {
                        next.last_location = Some(location);
                    }
                }
            }
        }
        RunEvent::Tick { now } => {
            if state.screen == Running {
                if let Some(session) = next.session.as_mut() {
                    session.refresh(now);
                }
            }
        }
        RunEvent::StartAreaCapture => {
            if state.capture.is_none() && state.screen != Summary {
                next.capture = Some(AreaCapture::new());
            }
        }
        RunEvent::AddCapturePoint(point) => {
            if let Some(capture) = next.capture.as_mut() {
                if let Err(e) = capture.add_point(point) {
                    next.message = Some(e.to_string());
                }
            }
        }
        RunEvent::UndoCapturePoint => {
            if let Some(capture) = next.capture.as_mut() {
                capture.undo();
            }
        }
        RunEvent::FinishAreaCapture => {
            if let Some(capture) = state.capture.as_ref() {
                match capture.finish(calculator) {
                    Ok(area) => {
                        next.capture = None;
                        match next.session.as_mut().filter(|s| s.is_active) {
                            Some(session) => session.add_area(area),
                            None => next.captured_areas.push(area),
                        }
                    }
                    Err(e) => {
                        log::debug!("[RunStateMachine] Capture not finished: {}", e);
                        next.message = Some(format!(
                            "Add at least {} points to capture an area",
                            crate::MIN_CAPTURE_POINTS
                        ));
                    }
                }
            }
        }
        RunEvent::CancelAreaCapture => {
            next.capture = None;
        }
        RunEvent::TerritoryClaimed(summary) => {
            next.last_claim = Some(summary);
            next.message = Some(format!(
                "Captured {} territory cells",
                summary.cells_claimed
            ));
        }
        RunEvent::ShowMessage(message) => {
            next.message = Some(message);
        }
        RunEvent::DismissMessage => {
            next.message = None;
        }
    }
    next
}

// ============================================================================
// Run Tracker
// ============================================================================

/// Owner of the current run snapshot.
///
/// Each method applies one event and replaces the snapshot wholesale.
pub struct RunTracker {
    state: RunUiState,
    calculator: Arc<dyn AreaCalculator>,
    config: SessionConfig,
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new(Arc::new(PlanarAreaCalculator), SessionConfig::default())
    }
}

impl std::fmt::Debug for RunTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunTracker")
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RunTracker {
    pub fn new(calculator: Arc<dyn AreaCalculator>, config: SessionConfig) -> Self {
        Self {
            state: RunUiState::default(),
            calculator,
            config,
        }
    }

    /// Current snapshot.
    pub fn state(&self) -> &RunUiState {
        &self.state
    }

    pub fn screen(&self) -> RunScreenState {
        self.state.screen
    }

    /// Apply an event. Returns whether the snapshot changed.
    pub fn dispatch(&mut self, event: RunEvent) -> bool {
        let next = reduce(&self.state, event, self.calculator.as_ref(), &self.config);
        let changed = next != self.state;
        self.state = next;
        changed
    }

    pub fn start_tracking(&mut self, session_id: &str, now: i64) -> bool {
        self.dispatch(RunEvent::StartTracking {
            session_id: session_id.to_string(),
            now,
        })
    }

    pub fn pause_tracking(&mut self) -> bool {
        self.dispatch(RunEvent::PauseTracking)
    }

    pub fn resume_tracking(&mut self) -> bool {
        self.dispatch(RunEvent::ResumeTracking)
    }

    pub fn show_map_in_paused(&mut self) -> bool {
        self.dispatch(RunEvent::ShowMapInPaused)
    }

    pub fn hide_map_in_paused(&mut self) -> bool {
        self.dispatch(RunEvent::HideMapInPaused)
    }

    /// Move to the summary and return the finalized session.
    pub fn finish_run(&mut self, now: i64) -> Option<RunSession> {
        if !self.state.screen.is_tracking() {
            return None;
        }
        self.dispatch(RunEvent::FinishRun { now });
        self.state.session.clone()
    }

    /// Abandon the run and return to the start screen.
    ///
    /// Returns the finalized session so the caller can decide whether to
    /// keep it.
    pub fn stop_tracking(&mut self, now: i64) -> Option<RunSession> {
        if !self.state.screen.is_tracking() {
            return None;
        }
        let mut stopped = self.state.session.clone();
        self.dispatch(RunEvent::StopTracking);
        if let Some(session) = stopped.as_mut() {
            session.finish(now);
        }
        stopped
    }

    pub fn show_maps(&mut self) -> bool {
        self.dispatch(RunEvent::ShowMaps)
    }

    pub fn reset(&mut self) -> bool {
        self.dispatch(RunEvent::Reset)
    }

    /// Feed a location sample. Returns whether it was added to the path.
    pub fn on_location_update(&mut self, location: LocationModel, now: i64) -> bool {
        let before = self.state.session.as_ref().map_or(0, |s| s.path.len());
        self.dispatch(RunEvent::LocationUpdated { location, now });
        let after = self.state.session.as_ref().map_or(0, |s| s.path.len());
        after > before
    }

    pub fn tick(&mut self, now: i64) -> bool {
        self.dispatch(RunEvent::Tick { now })
    }

    pub fn start_area_capture(&mut self) -> bool {
        self.dispatch(RunEvent::StartAreaCapture)
    }

    pub fn add_capture_point(&mut self, point: LocationModel) -> bool {
        self.dispatch(RunEvent::AddCapturePoint(point))
    }

    pub fn undo_capture_point(&mut self) -> bool {
        self.dispatch(RunEvent::UndoCapturePoint)
    }

    /// Close the capture polygon. Returns the new area on success.
    pub fn finish_area_capture(&mut self) -> Option<AreaModel> {
        let before = self.state.all_areas().count();
        self.dispatch(RunEvent::FinishAreaCapture);
        if self.state.all_areas().count() <= before {
            return None;
        }
        let in_session = self
            .state
            .session
            .as_ref()
            .filter(|s| s.is_active)
            .and_then(|s| s.captured_areas.last());
        in_session.or(self.state.captured_areas.last()).cloned()
    }

    pub fn cancel_area_capture(&mut self) -> bool {
        self.dispatch(RunEvent::CancelAreaCapture)
    }

    pub fn territory_claimed(&mut self, summary: ClaimSummary) -> bool {
        self.dispatch(RunEvent::TerritoryClaimed(summary))
    }

    pub fn show_message(&mut self, message: impl Into<String>) -> bool {
        self.dispatch(RunEvent::ShowMessage(message.into()))
    }

    pub fn dismiss_message(&mut self) -> bool {
        self.dispatch(RunEvent::DismissMessage)
    }
}
