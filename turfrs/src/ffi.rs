//! UniFFI exports for the mobile shell.
//!
//! A process-wide singleton holds the services and the signed-in user's run
//! controller. Complex values cross the boundary as JSON strings.

use std::sync::{Arc, Mutex};

use log::{info, warn};
use once_cell::sync::Lazy;
use turfcore::{Bounds, LeaderboardMetric, LocationModel, simulate};

use crate::config::TurfConfig;
use crate::controller::RunController;
use crate::http::GeoClient;
use crate::locator::AppServices;
use crate::repository::TerritoryRepository;

struct FfiState {
    services: AppServices,
    controller: RunController,
    runtime: Arc<tokio::runtime::Runtime>,
}

static TURF: Lazy<Mutex<Option<FfiState>>> = Lazy::new(|| Mutex::new(None));

fn with_state<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&FfiState) -> R,
{
    let guard = TURF.lock().ok()?;
    guard.as_ref().map(f)
}

/// Run a closure against the controller, outside the singleton lock.
fn with_controller<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&RunController) -> R,
{
    let controller = with_state(|s| s.controller.clone())?;
    Some(f(&controller))
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        warn!("[TurfFFI] Serialization failed: {}", e);
        String::new()
    })
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Initialize services for a signed-in user.
///
/// `config_json` may be empty to use defaults plus `TURF_*` overrides.
#[uniffi::export]
pub fn turf_init(config_json: String, uid: String) -> bool {
    crate::init_logging();
    info!("[TurfFFI] Initializing for {}", uid);

    let config = if config_json.trim().is_empty() {
        TurfConfig::from_env()
    } else {
        TurfConfig::from_json(&config_json)
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            warn!("[TurfFFI] Invalid config: {}", e);
            return false;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => Arc::new(rt),
        Err(e) => {
            warn!("[TurfFFI] Failed to create runtime: {}", e);
            return false;
        }
    };

    match AppServices::open(config) {
        Ok(services) => {
            let controller = services.run_controller(&uid);
            let Ok(mut guard) = TURF.lock() else {
                return false;
            };
            *guard = Some(FfiState {
                services,
                controller,
                runtime,
            });
            info!("[TurfFFI] Initialized successfully");
            true
        }
        Err(e) => {
            warn!("[TurfFFI] Failed to initialize: {}", e);
            false
        }
    }
}

#[uniffi::export]
pub fn turf_is_initialized() -> bool {
    TURF.lock().map(|guard| guard.is_some()).unwrap_or(false)
}

// ============================================================================
// Run transitions
// ============================================================================

#[uniffi::export]
pub fn run_start_tracking() -> Option<String> {
    with_controller(|c| c.start_tracking()).flatten()
}

#[uniffi::export]
pub fn run_pause_tracking() -> bool {
    with_controller(|c| c.pause_tracking()).unwrap_or(false)
}

#[uniffi::export]
pub fn run_resume_tracking() -> bool {
    with_controller(|c| c.resume_tracking()).unwrap_or(false)
}

#[uniffi::export]
pub fn run_show_map_in_paused() -> bool {
    with_controller(|c| c.show_map_in_paused()).unwrap_or(false)
}

#[uniffi::export]
pub fn run_hide_map_in_paused() -> bool {
    with_controller(|c| c.hide_map_in_paused()).unwrap_or(false)
}

/// Finish the run. Returns the saved session as JSON.
#[uniffi::export]
pub fn run_finish() -> Option<String> {
    with_controller(|c| c.finish_run())
        .flatten()
        .map(|s| to_json(&s))
}

#[uniffi::export]
pub fn run_stop() -> Option<String> {
    with_controller(|c| c.stop_tracking())
        .flatten()
        .map(|s| to_json(&s))
}

#[uniffi::export]
pub fn run_show_maps() -> bool {
    with_controller(|c| c.show_maps()).unwrap_or(false)
}

#[uniffi::export]
pub fn run_reset() -> bool {
    with_controller(|c| c.reset()).unwrap_or(false)
}

#[uniffi::export]
pub fn run_tick() -> bool {
    with_controller(|c| c.tick()).unwrap_or(false)
}

#[uniffi::export]
pub fn run_on_location_update(
    latitude: f64,
    longitude: f64,
    altitude: f64,
    accuracy: f64,
    timestamp: i64,
) -> bool {
    let location = LocationModel::with_fix(latitude, longitude, altitude, accuracy, timestamp);
    with_controller(|c| c.on_location_update(location)).unwrap_or(false)
}

/// Replay a simulated walk along flat `[lat, lng, lat, lng, ...]` waypoints.
/// Returns the number of accepted samples.
#[uniffi::export]
pub fn run_simulate_route(waypoints: Vec<f64>, speed_mps: f64, interval_ms: i64) -> u32 {
    let waypoints: Vec<LocationModel> = waypoints
        .chunks_exact(2)
        .map(|c| LocationModel::new(c[0], c[1]))
        .collect();
    with_controller(|c| {
        let start = c.snapshot().session.map_or(0, |s| s.start_time);
        let samples = simulate::simulate_route(&waypoints, speed_mps, interval_ms, start);
        c.replay(&samples) as u32
    })
    .unwrap_or(0)
}

/// Replay a simulated finger drag from one map point to another.
/// Returns the number of accepted samples.
#[uniffi::export]
pub fn run_simulate_drag(
    from_lat: f64,
    from_lng: f64,
    to_lat: f64,
    to_lng: f64,
    steps: u32,
    interval_ms: i64,
) -> u32 {
    let from = LocationModel::new(from_lat, from_lng);
    let to = LocationModel::new(to_lat, to_lng);
    with_controller(|c| {
        let state = c.snapshot();
        let start = state
            .last_location
            .map(|l| l.timestamp + interval_ms)
            .or_else(|| state.session.as_ref().map(|s| s.start_time))
            .unwrap_or(0);
        let samples = simulate::drag_samples(&from, &to, steps as usize, start, interval_ms);
        c.replay(&samples) as u32
    })
    .unwrap_or(0)
}

#[uniffi::export]
pub fn run_on_location_permission_denied() {
    with_controller(|c| c.on_location_permission_denied());
}

#[uniffi::export]
pub fn run_dismiss_message() -> bool {
    with_controller(|c| c.dismiss_message()).unwrap_or(false)
}

/// Current snapshot as JSON.
#[uniffi::export]
pub fn run_state_json() -> String {
    with_controller(|c| to_json(&c.snapshot())).unwrap_or_default()
}

/// Formatted distance, duration, pace and speed of the current run as JSON.
#[uniffi::export]
pub fn run_stats_json() -> Option<String> {
    with_controller(|c| c.snapshot().stats())
        .flatten()
        .map(|stats| to_json(&stats))
}

// ============================================================================
// Area capture and territory
// ============================================================================

#[uniffi::export]
pub fn capture_start() -> bool {
    with_controller(|c| c.start_area_capture()).unwrap_or(false)
}

#[uniffi::export]
pub fn capture_add_point(latitude: f64, longitude: f64) -> bool {
    let point = LocationModel::new(latitude, longitude);
    with_controller(|c| c.add_capture_point(point)).unwrap_or(false)
}

#[uniffi::export]
pub fn capture_undo() -> bool {
    with_controller(|c| c.undo_capture_point()).unwrap_or(false)
}

#[uniffi::export]
pub fn capture_cancel() -> bool {
    with_controller(|c| c.cancel_area_capture()).unwrap_or(false)
}

/// Finish the capture. The claim completes in the background and shows up
/// in the next snapshot.
#[uniffi::export]
pub fn capture_finish() -> bool {
    with_controller(|c| c.finish_area_capture().is_some()).unwrap_or(false)
}

fn territory_repository() -> Option<TerritoryRepository> {
    with_state(|s| s.services.territory.clone())
}

/// All owners' territory as JSON.
#[uniffi::export]
pub fn territory_json() -> String {
    territory_repository()
        .and_then(|repo| {
            repo.all_territory()
                .map_err(|e| warn!("[TurfFFI] Territory query failed: {}", e))
                .ok()
        })
        .map(|t| to_json(&t))
        .unwrap_or_default()
}

/// Cells intersecting a map viewport as JSON.
#[uniffi::export]
pub fn territory_viewport_json(min_lat: f64, max_lat: f64, min_lng: f64, max_lng: f64) -> String {
    let viewport = Bounds {
        min_lat,
        max_lat,
        min_lng,
        max_lng,
    };
    territory_repository()
        .and_then(|repo| {
            repo.index()
                .map_err(|e| warn!("[TurfFFI] Viewport query failed: {}", e))
                .ok()
        })
        .map(|index| to_json(&index.query_viewport(&viewport)))
        .unwrap_or_default()
}

/// Leaderboard for the signed-in user. `metric` is "territory" or "distance".
#[uniffi::export]
pub fn leaderboard_json(metric: String) -> String {
    let metric = match metric.as_str() {
        "distance" => LeaderboardMetric::Distance,
        _ => LeaderboardMetric::Territory,
    };
    let Some((leaderboard, uid)) = with_state(|s| {
        (
            s.services.leaderboard.clone(),
            s.controller.uid().to_string(),
        )
    }) else {
        return String::new();
    };
    leaderboard
        .build(&uid, metric)
        .map(|entries| to_json(&entries))
        .unwrap_or_else(|e| {
            warn!("[TurfFFI] Leaderboard failed: {}", e);
            String::new()
        })
}

// ============================================================================
// Geocoding
// ============================================================================

fn geo_handles() -> Option<(Arc<GeoClient>, Arc<tokio::runtime::Runtime>)> {
    with_state(|s| (s.services.geo.clone(), s.runtime.clone()))
}

/// Place name for a coordinate, or a coordinate label if unavailable.
#[uniffi::export]
pub fn reverse_geocode(latitude: f64, longitude: f64) -> String {
    let location = LocationModel::new(latitude, longitude);
    match geo_handles() {
        Some((geo, rt)) => rt.block_on(geo.reverse_geocode_or_placeholder(&location)),
        None => crate::http::placeholder_place_name(&location),
    }
}

/// Start and end place names of a saved run as JSON.
#[uniffi::export]
pub fn run_places_json(run_id: String) -> Option<String> {
    let (runs, geo, rt) = with_state(|s| {
        (
            s.services.runs.clone(),
            s.services.geo.clone(),
            s.runtime.clone(),
        )
    })?;
    let run = runs
        .get(&run_id)
        .map_err(|e| warn!("[TurfFFI] Run lookup failed: {}", e))
        .ok()??;
    rt.block_on(geo.describe_run_or_placeholder(&run))
        .map(|places| to_json(&places))
}

/// Walking route as JSON, or a straight line if routing fails.
#[uniffi::export]
pub fn walking_route_json(from_lat: f64, from_lng: f64, to_lat: f64, to_lng: f64) -> String {
    let from = LocationModel::new(from_lat, from_lng);
    let to = LocationModel::new(to_lat, to_lng);
    let route = match geo_handles() {
        Some((geo, rt)) => rt.block_on(geo.route_or_placeholder(&from, &to)),
        None => crate::http::Route::straight_line(&from, &to),
    };
    to_json(&route)
}

// ============================================================================
// Pure helpers
// ============================================================================

#[uniffi::export]
pub fn format_pace(duration_ms: i64, distance_m: f64) -> String {
    turfcore::format_pace(duration_ms, distance_m)
}

#[uniffi::export]
pub fn can_proceed_from_password(password: String, confirmation: String) -> bool {
    turfcore::can_proceed_from_password(&password, &confirmation)
}

#[uniffi::export]
pub fn can_proceed_from_email(email: String) -> bool {
    turfcore::can_proceed_from_email(&email)
}
