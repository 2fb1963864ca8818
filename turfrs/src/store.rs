//! Remote store abstraction.
//!
//! The store is organised as users, runs, territory cells and friend
//! requests (plus the accepted friend links). Implementations must be
//! shareable across threads; the run controller writes territory from a
//! background thread.

use serde::{Deserialize, Serialize};
use turfcore::{RunSession, TerritoryCell, UserProfile};

use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Declined,
}

impl FriendRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendRequestStatus::Pending => "pending",
            FriendRequestStatus::Accepted => "accepted",
            FriendRequestStatus::Declined => "declined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(FriendRequestStatus::Pending),
            "accepted" => Some(FriendRequestStatus::Accepted),
            "declined" => Some(FriendRequestStatus::Declined),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub from_uid: String,
    pub to_uid: String,
    pub status: FriendRequestStatus,
    /// Unix timestamp (ms)
    pub created_at: i64,
}

/// Persistent storage for every app entity.
pub trait RemoteStore: Send + Sync {
    // Users
    fn save_user(&self, profile: &UserProfile) -> AppResult<()>;
    fn get_user(&self, uid: &str) -> AppResult<Option<UserProfile>>;

    // Runs
    fn save_run(&self, uid: &str, run: &RunSession) -> AppResult<()>;
    fn get_run(&self, run_id: &str) -> AppResult<Option<RunSession>>;
    /// Runs for a user, newest first.
    fn list_runs(&self, uid: &str) -> AppResult<Vec<RunSession>>;
    fn delete_run(&self, run_id: &str) -> AppResult<bool>;

    // Territory
    /// Write ownership for each cell. The last write to a cell wins.
    fn upsert_cells(&self, cells: &[TerritoryCell]) -> AppResult<usize>;
    fn all_cells(&self) -> AppResult<Vec<TerritoryCell>>;
    fn cells_for_owner(&self, uid: &str) -> AppResult<Vec<TerritoryCell>>;

    // Friends
    /// Insert a request, or overwrite the status of an existing one.
    fn save_friend_request(&self, request: &FriendRequest) -> AppResult<()>;
    fn get_friend_request(&self, from_uid: &str, to_uid: &str)
    -> AppResult<Option<FriendRequest>>;
    /// Pending requests addressed to `uid`.
    fn incoming_requests(&self, uid: &str) -> AppResult<Vec<FriendRequest>>;
    /// Link two users in both directions.
    fn add_friendship(&self, a: &str, b: &str) -> AppResult<()>;
    fn remove_friendship(&self, a: &str, b: &str) -> AppResult<()>;
    fn friends_of(&self, uid: &str) -> AppResult<Vec<String>>;
}
