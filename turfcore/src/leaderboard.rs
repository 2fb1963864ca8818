//! Leaderboard ranking over a runner and their friends.

use serde::{Deserialize, Serialize};

/// What the leaderboard is ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LeaderboardMetric {
    /// Total captured territory in square meters
    #[default]
    Territory,
    /// Total distance run in meters
    Distance,
}

/// Aggregated totals for one runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerTotals {
    pub uid: String,
    pub display_name: String,
    pub territory_m2: f64,
    pub distance_m: f64,
    pub run_count: u32,
}

impl RunnerTotals {
    pub fn new(uid: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: display_name.into(),
            territory_m2: 0.0,
            distance_m: 0.0,
            run_count: 0,
        }
    }

    fn score(&self, metric: LeaderboardMetric) -> f64 {
        match metric {
            LeaderboardMetric::Territory => self.territory_m2,
            LeaderboardMetric::Distance => self.distance_m,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based position
    pub rank: u32,
    pub uid: String,
    pub display_name: String,
    pub score: f64,
    pub is_current_user: bool,
}

/// Rank runners by `metric`, highest first. Ties break on uid.
pub fn build_leaderboard(
    mut runners: Vec<RunnerTotals>,
    metric: LeaderboardMetric,
    current_uid: &str,
) -> Vec<LeaderboardEntry> {
    runners.sort_by(|a, b| {
        b.score(metric)
            .total_cmp(&a.score(metric))
            .then_with(|| a.uid.cmp(&b.uid))
    });

    runners
        .into_iter()
        .enumerate()
        .map(|(i, r)| LeaderboardEntry {
            rank: i as u32 + 1,
            score: r.score(metric),
            is_current_user: r.uid == current_uid,
            uid: r.uid,
            display_name: r.display_name,
        })
        .collect()
}
