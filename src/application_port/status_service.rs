use crate::domain_model::*;

/// Read side: the session user's relationship to other users.
///
/// Lookups never fail; an unresolvable relationship is reported as
/// [`FriendshipStatus::None`].
#[async_trait::async_trait]
pub trait StatusService: Send + Sync {
    async fn status(&self, user_id: UserId) -> FriendshipStatus;
    async fn status_many(&self, user_ids: &[UserId]) -> Vec<(UserId, FriendshipStatus)>;
}
