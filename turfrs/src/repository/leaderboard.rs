use std::sync::Arc;

use turfcore::{LeaderboardEntry, LeaderboardMetric, RunnerTotals, TerritoryGrid};

use super::{FriendsRepository, RunRepository, TerritoryRepository, UserRepository};
use crate::error::AppResult;
use crate::store::RemoteStore;

/// Leaderboard over a user and their friends.
#[derive(Clone)]
pub struct LeaderboardRepository {
    users: UserRepository,
    runs: RunRepository,
    territory: TerritoryRepository,
    friends: FriendsRepository,
}

impl LeaderboardRepository {
    pub fn new(store: Arc<dyn RemoteStore>, grid: TerritoryGrid) -> Self {
        Self {
            users: UserRepository::new(store.clone()),
            runs: RunRepository::new(store.clone()),
            territory: TerritoryRepository::new(store.clone(), grid),
            friends: FriendsRepository::new(store),
        }
    }

    pub fn totals_for(&self, uid: &str) -> AppResult<RunnerTotals> {
        let (distance_m, run_count) = self.runs.totals(uid)?;
        Ok(RunnerTotals {
            uid: uid.to_string(),
            display_name: self.users.display_name(uid)?,
            territory_m2: self.territory.total_area(uid)?,
            distance_m,
            run_count,
        })
    }

    pub fn build(&self, uid: &str, metric: LeaderboardMetric) -> AppResult<Vec<LeaderboardEntry>> {
        let mut members = vec![uid.to_string()];
        members.extend(self.friends.friends(uid)?);

        let totals = members
            .iter()
            .map(|m| self.totals_for(m))
            .collect::<AppResult<Vec<_>>>()?;
        Ok(turfcore::build_leaderboard(totals, metric, uid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SqliteStore;
    use turfcore::{LocationModel, RunSession, SessionConfig};

    fn square(lat: f64, lon: f64, side: f64) -> Vec<LocationModel> {
        vec![
            LocationModel::new(lat, lon),
            LocationModel::new(lat + side, lon),
            LocationModel::new(lat + side, lon + side),
            LocationModel::new(lat, lon + side),
        ]
    }

    fn save_run(store: &Arc<dyn RemoteStore>, uid: &str, id: &str, steps: usize) {
        let config = SessionConfig::default();
        let mut run = RunSession::start(id, 0);
        for i in 0..steps {
            let p = LocationModel::new(51.5 + i as f64 * 0.001, -0.12);
            run.record_location(p, 0, &config);
        }
        run.finish(60_000);
        RunRepository::new(store.clone()).save(uid, &run).unwrap();
    }

    #[test]
    fn test_leaderboard_covers_user_and_friends() {
        let store: Arc<dyn RemoteStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let grid = TerritoryGrid::default();
        let territory = TerritoryRepository::new(store.clone(), grid);
        let friends = FriendsRepository::new(store.clone());

        friends.send_request("alice", "bob", 0).unwrap();
        friends.accept("alice", "bob").unwrap();

        territory
            .claim("alice", &square(51.50001, -0.12001, 0.0009))
            .unwrap();
        territory
            .claim("bob", &square(51.60001, -0.12001, 0.0015))
            .unwrap();
        territory
            .claim("stranger", &square(51.70001, -0.12001, 0.003))
            .unwrap();
        save_run(&store, "alice", "a1", 10);
        save_run(&store, "bob", "b1", 3);

        let board = LeaderboardRepository::new(store.clone(), grid);
        let by_area = board.build("alice", LeaderboardMetric::Territory).unwrap();
        assert_eq!(by_area.len(), 2);
        assert_eq!(by_area[0].uid, "bob");
        assert_eq!(by_area[0].rank, 1);
        assert!(by_area[1].is_current_user);

        let by_distance = board.build("alice", LeaderboardMetric::Distance).unwrap();
        assert_eq!(by_distance[0].uid, "alice");
        assert_eq!(by_distance[0].display_name, "alice");
    }

    #[test]
    fn test_leaderboard_alone() {
        let store: Arc<dyn RemoteStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let board = LeaderboardRepository::new(store, TerritoryGrid::default());
        let entries = board.build("solo", LeaderboardMetric::Territory).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].score, 0.0);
        assert_eq!(entries[0].rank, 1);
    }
}
