use std::sync::Arc;

use log::info;
use turfcore::TurfError;

use crate::error::{AppError, AppResult};
use crate::store::{FriendRequest, FriendRequestStatus, RemoteStore};

fn rejected(reason: &str) -> AppError {
    TurfError::validation("friend request", reason).into()
}

/// Friend requests and the symmetric friend links they create.
#[derive(Clone)]
pub struct FriendsRepository {
    store: Arc<dyn RemoteStore>,
}

impl FriendsRepository {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Create a pending request.
    ///
    /// Requests to yourself, to an existing friend, or duplicating a
    /// pending request in either direction are rejected.
    pub fn send_request(
        &self,
        from_uid: &str,
        to_uid: &str,
        now: i64,
    ) -> AppResult<FriendRequest> {
        if from_uid == to_uid {
            return Err(rejected("cannot befriend yourself"));
        }
        if self.are_friends(from_uid, to_uid)? {
            return Err(rejected("already friends"));
        }
        let pending = |a: &str, b: &str| -> AppResult<bool> {
            Ok(self
                .store
                .get_friend_request(a, b)?
                .is_some_and(|r| r.status == FriendRequestStatus::Pending))
        };
        if pending(from_uid, to_uid)? || pending(to_uid, from_uid)? {
            return Err(rejected("already pending"));
        }

        let request = FriendRequest {
            from_uid: from_uid.to_string(),
            to_uid: to_uid.to_string(),
            status: FriendRequestStatus::Pending,
            created_at: now,
        };
        self.store.save_friend_request(&request)?;
        info!("[FriendsRepository] {} -> {} requested", from_uid, to_uid);
        Ok(request)
    }

    fn pending_request(&self, from_uid: &str, to_uid: &str) -> AppResult<FriendRequest> {
        let request = self
            .store
            .get_friend_request(from_uid, to_uid)?
            .ok_or_else(|| {
                AppError::not_found("Friend request", format!("{}->{}", from_uid, to_uid))
            })?;
        if request.status != FriendRequestStatus::Pending {
            return Err(rejected("already answered"));
        }
        Ok(request)
    }

    fn record_answer(
        &self,
        mut request: FriendRequest,
        status: FriendRequestStatus,
    ) -> AppResult<FriendRequest> {
        request.status = status;
        self.store.save_friend_request(&request)?;
        info!(
            "[FriendsRepository] {} -> {} {}",
            request.from_uid,
            request.to_uid,
            status.as_str()
        );
        Ok(request)
    }

    /// Accept a pending request and link both users.
    ///
    /// The link is written before the request is marked accepted, so a
    /// failed link leaves the request pending and the call can be retried.
    pub fn accept(&self, from_uid: &str, to_uid: &str) -> AppResult<FriendRequest> {
        let request = self.pending_request(from_uid, to_uid)?;
        self.store.add_friendship(from_uid, to_uid)?;
        self.record_answer(request, FriendRequestStatus::Accepted)
    }

    pub fn decline(&self, from_uid: &str, to_uid: &str) -> AppResult<FriendRequest> {
        let request = self.pending_request(from_uid, to_uid)?;
        self.record_answer(request, FriendRequestStatus::Declined)
    }

    /// Pending requests addressed to `uid`.
    pub fn incoming(&self, uid: &str) -> AppResult<Vec<FriendRequest>> {
        self.store.incoming_requests(uid)
    }

    pub fn friends(&self, uid: &str) -> AppResult<Vec<String>> {
        self.store.friends_of(uid)
    }

    pub fn are_friends(&self, a: &str, b: &str) -> AppResult<bool> {
        Ok(self.store.friends_of(a)?.iter().any(|f| f == b))
    }

    pub fn remove(&self, a: &str, b: &str) -> AppResult<()> {
        self.store.remove_friendship(a, b)
    }
}
