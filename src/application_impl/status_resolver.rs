use crate::application_impl::ConsistencyCoordinator;
use crate::application_port::*;
use crate::domain_model::*;
use futures_util::future::join_all;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Ask the backend when the snapshot knows nothing about a user.
    pub remote_fallback: bool,
    /// Queue a cache repair after a successful fallback lookup.
    pub self_heal: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            remote_fallback: true,
            self_heal: true,
        }
    }
}

/// Cache-first relationship lookups for the coordinator's session user.
pub struct StatusResolver {
    coordinator: Arc<ConsistencyCoordinator>,
    config: ResolverConfig,
}

impl StatusResolver {
    pub fn new(coordinator: Arc<ConsistencyCoordinator>, config: ResolverConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    /// `None` when the backend could not answer.
    async fn remote_lookup(&self, user_id: UserId) -> Option<FriendshipStatus> {
        let me = self.coordinator.me();
        match self.coordinator.edge_store().remote_status(me, user_id).await {
            Ok(status) => {
                tracing::debug!("remote status of {user_id} for {me}: {}", status.kind());
                Some(status)
            }
            Err(e) => {
                tracing::warn!("remote status of {user_id} for {me} failed, assuming none: {e}");
                None
            }
        }
    }

    fn schedule_heal(&self) {
        if self.config.self_heal {
            self.coordinator.schedule_refresh();
        }
    }
}

#[async_trait::async_trait]
impl StatusService for StatusResolver {
    async fn status(&self, user_id: UserId) -> FriendshipStatus {
        if user_id == self.coordinator.me() {
            return FriendshipStatus::None;
        }
        if let Some(status) = self.coordinator.current_snapshot().status_of(&user_id) {
            return status;
        }
        if !self.config.remote_fallback {
            return FriendshipStatus::None;
        }

        match self.remote_lookup(user_id).await {
            Some(status) => {
                self.schedule_heal();
                status
            }
            None => FriendshipStatus::None,
        }
    }

    async fn status_many(&self, user_ids: &[UserId]) -> Vec<(UserId, FriendshipStatus)> {
        let me = self.coordinator.me();
        let snapshot = self.coordinator.current_snapshot();

        let mut resolved: Vec<(UserId, Option<FriendshipStatus>)> = user_ids
            .iter()
            .map(|user_id| {
                if *user_id == me {
                    (*user_id, Some(FriendshipStatus::None))
                } else if !self.config.remote_fallback {
                    (*user_id, Some(snapshot.status_of(user_id).unwrap_or(FriendshipStatus::None)))
                } else {
                    (*user_id, snapshot.status_of(user_id))
                }
            })
            .collect();

        let misses: Vec<UserId> = resolved
            .iter()
            .filter(|(_, status)| status.is_none())
            .map(|(user_id, _)| *user_id)
            .collect();
        if misses.is_empty() {
            return resolved
                .into_iter()
                .map(|(user_id, status)| (user_id, status.unwrap_or(FriendshipStatus::None)))
                .collect();
        }

        let remote = join_all(misses.iter().map(|user_id| self.remote_lookup(*user_id))).await;
        if remote.iter().any(Option::is_some) {
            self.schedule_heal();
        }

        let mut remote = misses.into_iter().zip(remote);
        for (user_id, status) in resolved.iter_mut() {
            if status.is_none() {
                *status = remote
                    .next()
                    .filter(|(missed, _)| *missed == *user_id)
                    .and_then(|(_, s)| s);
            }
        }
        resolved
            .into_iter()
            .map(|(user_id, status)| (user_id, status.unwrap_or(FriendshipStatus::None)))
            .collect()
    }
}
