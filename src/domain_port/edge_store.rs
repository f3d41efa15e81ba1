use crate::domain_model::*;
use std::collections::BTreeSet;

#[derive(Debug, thiserror::Error)]
pub enum EdgeStoreError {
    #[error("a pending request already exists for this pair")]
    DuplicatePending,
    #[error("cannot send a friend request to self")]
    SelfRequest,
    #[error("users are already friends")]
    AlreadyFriends,
    #[error("request not found")]
    NotFound,
    #[error("request already accepted or rejected")]
    AlreadyTerminal,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// The authoritative friendship backend.
///
/// Listings must be side-effect free and return the complete current view,
/// never a delta. Any call may fail with [`EdgeStoreError::Transport`].
#[async_trait::async_trait]
pub trait EdgeStore: Send + Sync {
    async fn send_request(&self, from: UserId, to: UserId) -> Result<RequestId, EdgeStoreError>;

    async fn get_request(&self, request_id: RequestId) -> Result<FriendRequest, EdgeStoreError>;

    /// Moves a pending request to `status` and returns the updated record.
    async fn set_request_status(
        &self,
        request_id: RequestId,
        status: RequestStatus,
    ) -> Result<FriendRequest, EdgeStoreError>;

    async fn delete_request(&self, request_id: RequestId) -> Result<(), EdgeStoreError>;

    /// Idempotent.
    async fn insert_edges_both_directions(&self, a: UserId, b: UserId)
    -> Result<(), EdgeStoreError>;

    async fn delete_edges_both_directions(&self, a: UserId, b: UserId)
    -> Result<(), EdgeStoreError>;

    async fn list_friend_ids(&self, user_id: UserId) -> Result<BTreeSet<UserId>, EdgeStoreError>;

    async fn list_pending_requests(
        &self,
        user_id: UserId,
    ) -> Result<PendingRequests, EdgeStoreError>;

    /// Point lookup of `b` as seen from `a`.
    async fn remote_status(&self, a: UserId, b: UserId)
    -> Result<FriendshipStatus, EdgeStoreError>;
}
