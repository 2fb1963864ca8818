//! End-to-end run flow against an on-disk store.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use tempfile::TempDir;
use turfrs::{
    AppError, AppResult, AppServices, FriendRequest, LeaderboardMetric, LocationModel,
    OnboardingForm, OnboardingStep, RemoteStore, RunScreenState, RunSession, SessionConfig,
    SqliteStore, TerritoryCell, TurfConfig, UserProfile,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Store wrapper that counts run writes.
struct CountingStore {
    inner: SqliteStore,
    run_saves: AtomicUsize,
}

impl RemoteStore for CountingStore {
    fn save_user(&self, profile: &UserProfile) -> AppResult<()> {
        self.inner.save_user(profile)
    }
    fn get_user(&self, uid: &str) -> AppResult<Option<UserProfile>> {
        self.inner.get_user(uid)
    }
    fn save_run(&self, uid: &str, run: &RunSession) -> AppResult<()> {
        self.run_saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_run(uid, run)
    }
    fn get_run(&self, run_id: &str) -> AppResult<Option<RunSession>> {
        self.inner.get_run(run_id)
    }
    fn list_runs(&self, uid: &str) -> AppResult<Vec<RunSession>> {
        self.inner.list_runs(uid)
    }
    fn delete_run(&self, run_id: &str) -> AppResult<bool> {
        self.inner.delete_run(run_id)
    }
    fn upsert_cells(&self, cells: &[TerritoryCell]) -> AppResult<usize> {
        self.inner.upsert_cells(cells)
    }
    fn all_cells(&self) -> AppResult<Vec<TerritoryCell>> {
        self.inner.all_cells()
    }
    fn cells_for_owner(&self, uid: &str) -> AppResult<Vec<TerritoryCell>> {
        self.inner.cells_for_owner(uid)
    }
    fn save_friend_request(&self, request: &FriendRequest) -> AppResult<()> {
        self.inner.save_friend_request(request)
    }
    fn get_friend_request(
        &self,
        from_uid: &str,
        to_uid: &str,
    ) -> AppResult<Option<FriendRequest>> {
        self.inner.get_friend_request(from_uid, to_uid)
    }
    fn incoming_requests(&self, uid: &str) -> AppResult<Vec<FriendRequest>> {
        self.inner.incoming_requests(uid)
    }
    fn add_friendship(&self, a: &str, b: &str) -> AppResult<()> {
        self.inner.add_friendship(a, b)
    }
    fn remove_friendship(&self, a: &str, b: &str) -> AppResult<()> {
        self.inner.remove_friendship(a, b)
    }
    fn friends_of(&self, uid: &str) -> AppResult<Vec<String>> {
        self.inner.friends_of(uid)
    }
}

fn config_in(dir: &TempDir) -> TurfConfig {
    TurfConfig {
        db_path: dir
            .path()
            .join("turf.db")
            .to_string_lossy()
            .into_owned(),
        // Nothing listens on the discard port
        geocoder_url: "http://127.0.0.1:9".to_string(),
        routing_url: "http://127.0.0.1:9".to_string(),
        http_timeout_secs: 2,
        ..TurfConfig::default()
    }
}

fn square(lat: f64, lon: f64, side: f64) -> Vec<LocationModel> {
    vec![
        LocationModel::new(lat, lon),
        LocationModel::new(lat + side, lon),
        LocationModel::new(lat + side, lon + side),
        LocationModel::new(lat, lon + side),
    ]
}

#[test]
fn finish_run_saves_exactly_once() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let store = Arc::new(CountingStore {
        inner: SqliteStore::open(&config.db_path).unwrap(),
        run_saves: AtomicUsize::new(0),
    });
    let now = Arc::new(AtomicI64::new(0));
    let clock_now = now.clone();
    let services = AppServices::with_store(config, store.clone())
        .unwrap()
        .with_clock(Arc::new(move || clock_now.load(Ordering::SeqCst)));
    let controller = services.run_controller("alice");

    let run_id = controller.start_tracking().unwrap();
    for (i, t) in [0i64, 30_000, 60_000, 90_000].iter().enumerate() {
        now.store(*t, Ordering::SeqCst);
        assert!(controller.on_location_update(
            LocationModel::new(51.5 + i as f64 * 0.001, -0.12)
                .with_accuracy(8.0)
                .at(*t)
        ));
    }
    // Inaccurate fix is dropped
    let inaccurate = LocationModel::new(51.6, -0.12)
        .with_accuracy(200.0)
        .at(95_000);
    assert!(!controller.on_location_update(inaccurate));

    controller.pause_tracking();
    let paused_fix = LocationModel::new(51.51, -0.12).at(100_000);
    assert!(!controller.on_location_update(paused_fix));
    now.store(120_000, Ordering::SeqCst);

    let session = controller.finish_run().unwrap();
    assert_eq!(session.id, run_id);
    assert!(!session.is_active);
    assert_eq!(session.end_time, Some(120_000));
    assert_eq!(session.path.len(), 4);
    assert_eq!(store.run_saves.load(Ordering::SeqCst), 1);

    controller.show_maps();
    controller.reset();
    assert_eq!(controller.screen(), RunScreenState::ReadyToStart);
    assert_eq!(store.run_saves.load(Ordering::SeqCst), 1);

    let stored = services.runs.get(&run_id).unwrap().unwrap();
    assert_eq!(stored, session);
}

#[test]
fn data_survives_reopen() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    {
        let services = AppServices::open(config.clone()).unwrap();
        services
            .territory
            .claim("alice", &square(51.50001, -0.12001, 0.0009))
            .unwrap();
    }
    let services = AppServices::open(config).unwrap();
    let territory = services.territory.territory_for("alice").unwrap().unwrap();
    assert_eq!(territory.cell_count, 9);
}

#[test]
fn onboarding_friends_and_leaderboard() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let services = AppServices::open(config_in(&dir)).unwrap();

    let mut form = OnboardingForm::new();
    form.next();
    form.email = "alice@example.com".to_string();
    form.next();
    form.password = "pw".to_string();
    form.password_confirmation = "pw".to_string();
    form.next();
    form.display_name = "Alice".to_string();
    form.next();
    assert_eq!(form.next(), OnboardingStep::Done);
    services.users.register("alice", form).unwrap();

    services.friends.send_request("alice", "bob", 1).unwrap();
    services.friends.accept("alice", "bob").unwrap();

    services
        .territory
        .claim("alice", &square(51.50001, -0.12001, 0.0015))
        .unwrap();
    // Bob takes over part of Alice's block
    services
        .territory
        .claim("bob", &square(51.50001, -0.12001, 0.0009))
        .unwrap();

    let board = services
        .leaderboard
        .build("bob", LeaderboardMetric::Territory)
        .unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].display_name, "Alice");
    assert_eq!(board[0].rank, 1);
    assert!(board[1].is_current_user);
    assert!(board[0].score > board[1].score);
}

#[tokio::test]
async fn unreachable_geocoder_falls_back_to_placeholder() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let services = AppServices::open(config_in(&dir)).unwrap();
    let here = LocationModel::new(51.5, -0.12);

    assert!(services.geo.reverse_geocode(&here).await.is_err());
    let name = services.geo.reverse_geocode_or_placeholder(&here).await;
    assert_eq!(name, "51.50000, -0.12000");
    assert_eq!(services.geo.cached_count(), 0);

    let there = LocationModel::new(51.501, -0.12);
    let route = services.geo.route_or_placeholder(&here, &there).await;
    assert_eq!(route.path.len(), 2);
    assert!(services.geo.search_or_placeholder("park").await.is_empty());

    let mut run = RunSession::start("run-1", 0);
    assert!(matches!(
        services.geo.describe_run(&run).await,
        Err(AppError::NotFound { .. })
    ));
    let places = services.geo.describe_run_or_placeholder(&run).await;
    assert!(places.is_none());

    let config = SessionConfig::default();
    run.record_location(here, 0, &config);
    run.record_location(there, 60_000, &config);
    assert!(services.geo.describe_run(&run).await.is_err());
    let places = services.geo.describe_run_or_placeholder(&run).await.unwrap();
    assert_eq!(places.start, "51.50000, -0.12000");
    assert_eq!(places.end, "51.50100, -0.12000");
}
