//! Service locator wiring the app layer together.

use std::sync::Arc;

use log::info;
use turfcore::{AreaCalculator, PlanarAreaCalculator, RunTracker};

use crate::clock::{Clock, SystemClock};
use crate::config::TurfConfig;
use crate::controller::RunController;
use crate::error::AppResult;
use crate::http::GeoClient;
use crate::persistence::SqliteStore;
use crate::repository::{
    FriendsRepository, LeaderboardRepository, RunRepository, TerritoryRepository, UserRepository,
};
use crate::store::RemoteStore;

/// Every long-lived service, built once from a [`TurfConfig`].
pub struct AppServices {
    pub config: TurfConfig,
    pub store: Arc<dyn RemoteStore>,
    pub runs: RunRepository,
    pub territory: TerritoryRepository,
    pub friends: FriendsRepository,
    pub users: UserRepository,
    pub leaderboard: LeaderboardRepository,
    pub geo: Arc<GeoClient>,
    pub calculator: Arc<dyn AreaCalculator>,
    pub clock: Arc<dyn Clock>,
}

impl AppServices {
    /// Open the SQLite store at `config.db_path` and build every service.
    pub fn open(config: TurfConfig) -> AppResult<Self> {
        config.validate()?;
        let store: Arc<dyn RemoteStore> = Arc::new(SqliteStore::open(&config.db_path)?);
        Self::with_store(config, store)
    }

    /// Build services over an existing store.
    pub fn with_store(config: TurfConfig, store: Arc<dyn RemoteStore>) -> AppResult<Self> {
        config.validate()?;
        let grid = config.grid();
        let geo = Arc::new(GeoClient::new(&config)?);
        info!(
            "[AppServices] Ready (cell size {}°, geocoder {})",
            config.cell_size_deg, config.geocoder_url
        );

        Ok(Self {
            runs: RunRepository::new(store.clone()),
            territory: TerritoryRepository::new(store.clone(), grid)
                .with_max_claim_cells(config.max_claim_cells),
            friends: FriendsRepository::new(store.clone()),
            users: UserRepository::new(store.clone()),
            leaderboard: LeaderboardRepository::new(store.clone(), grid),
            store,
            geo,
            calculator: Arc::new(PlanarAreaCalculator),
            clock: Arc::new(SystemClock),
            config,
        })
    }

    pub fn with_calculator(mut self, calculator: Arc<dyn AreaCalculator>) -> Self {
        self.calculator = calculator;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// A run controller for a signed-in user.
    pub fn run_controller(&self, uid: &str) -> RunController {
        let tracker = RunTracker::new(self.calculator.clone(), self.config.session_config());
        RunController::new(
            uid,
            tracker,
            self.runs.clone(),
            self.territory.clone(),
            self.clock.clone(),
        )
    }
}
