//! Repositories over the remote store.
//!
//! Each repository is a thin, cloneable handle around a shared
//! [`RemoteStore`](crate::store::RemoteStore). They add validation and
//! aggregation but hold no state of their own.

pub mod friends;
pub mod leaderboard;
pub mod runs;
pub mod territory;
pub mod users;

pub use friends::FriendsRepository;
pub use leaderboard::LeaderboardRepository;
pub use runs::RunRepository;
pub use territory::TerritoryRepository;
pub use users::UserRepository;
