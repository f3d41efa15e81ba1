use crate::domain_model::*;
use crate::domain_port::EdgeStoreError;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RelationError {
    #[error("friend request already pending")]
    DuplicatePending,
    #[error("cannot target self")]
    SelfRequest,
    #[error("friendship already established")]
    AlreadyFriends,
    #[error("request not found")]
    NotFound,
    #[error("request already accepted or rejected")]
    AlreadyTerminal,
    #[error("transport failure: {0}")]
    TransportFailure(String),
    #[error("change committed but reconciliation failed: {0}")]
    ReconcileFailed(String),
}

impl RelationError {
    /// The local view is likely stale; refresh before retrying.
    pub fn needs_refresh(&self) -> bool {
        matches!(
            self,
            RelationError::NotFound | RelationError::AlreadyTerminal | RelationError::ReconcileFailed(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, RelationError::TransportFailure(_))
    }
}

impl From<EdgeStoreError> for RelationError {
    fn from(err: EdgeStoreError) -> Self {
        match err {
            EdgeStoreError::DuplicatePending => RelationError::DuplicatePending,
            EdgeStoreError::SelfRequest => RelationError::SelfRequest,
            EdgeStoreError::AlreadyFriends => RelationError::AlreadyFriends,
            EdgeStoreError::NotFound => RelationError::NotFound,
            EdgeStoreError::AlreadyTerminal => RelationError::AlreadyTerminal,
            EdgeStoreError::Transport(e) => RelationError::TransportFailure(e),
            EdgeStoreError::Decode(e) => RelationError::TransportFailure(e),
        }
    }
}

/// Write side of the friendship graph for one session user.
///
/// Every successful call leaves the cache holding a freshly reconciled
/// snapshot; every failed call leaves it untouched.
#[async_trait::async_trait]
pub trait RelationshipService: Send + Sync {
    async fn send_request(&self, to: UserId) -> Result<RequestId, RelationError>;
    async fn accept_request(&self, request_id: RequestId) -> Result<(), RelationError>;
    async fn reject_request(&self, request_id: RequestId) -> Result<(), RelationError>;
    async fn cancel_request(&self, request_id: RequestId) -> Result<(), RelationError>;
    async fn remove_friend(&self, user_id: UserId) -> Result<(), RelationError>;
    async fn force_refresh(&self) -> Result<Arc<FriendshipSnapshot>, RelationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_store_error_mapping() {
        assert!(matches!(
            RelationError::from(EdgeStoreError::DuplicatePending),
            RelationError::DuplicatePending
        ));
        assert!(matches!(
            RelationError::from(EdgeStoreError::Decode("bad row".into())),
            RelationError::TransportFailure(e) if e == "bad row"
        ));
        assert!(RelationError::from(EdgeStoreError::NotFound).needs_refresh());
        assert!(RelationError::from(EdgeStoreError::Transport("timeout".into())).is_retryable());
        assert!(!RelationError::SelfRequest.is_retryable());
    }
}
