use crate::application_impl::FriendshipCache;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    /// Wake subscribers even when a reconciliation produced the same view.
    pub notify_on_unchanged: bool,
}

/// Sole writer of a [`FriendshipCache`].
///
/// Every mutation runs its backend call and then a full reconciliation while
/// holding `write_lock`, so at most one of them is in flight per session and
/// a newer snapshot can never be overwritten by an older one. The lock guards
/// the snapshot generation counter.
///
/// Mutations run on a spawned task. A caller that stops awaiting one does not
/// stop it, and the reconciliation after a committed change always happens.
pub struct ConsistencyCoordinator {
    me: UserId,
    this: Weak<ConsistencyCoordinator>,
    edge_store: Arc<dyn EdgeStore>,
    cache: FriendshipCache,
    write_lock: Mutex<u64>,
    repair_scheduled: AtomicBool,
    cancel: CancellationToken,
    config: CoordinatorConfig,
}

impl ConsistencyCoordinator {
    pub fn new(me: UserId, edge_store: Arc<dyn EdgeStore>, config: CoordinatorConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            me,
            this: this.clone(),
            edge_store,
            cache: FriendshipCache::new(),
            write_lock: Mutex::new(0),
            repair_scheduled: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            config,
        })
    }

    pub fn me(&self) -> UserId {
        self.me
    }

    /// Read-only handle for consumers of the snapshot.
    pub fn cache(&self) -> FriendshipCache {
        self.cache.clone()
    }

    pub fn current_snapshot(&self) -> Arc<FriendshipSnapshot> {
        self.cache.current_snapshot()
    }

    pub(crate) fn edge_store(&self) -> &Arc<dyn EdgeStore> {
        &self.edge_store
    }

    /// Rebuilds the snapshot from the backend without a preceding mutation.
    pub async fn reconcile(&self) -> Result<Arc<FriendshipSnapshot>, RelationError> {
        let mut generation = self.write_lock.lock().await;
        self.reconcile_locked(&mut generation).await.map_err(|e| {
            tracing::warn!("reconcile for {} failed: {e}", self.me);
            RelationError::from(e)
        })
    }

    /// Queues a background [`RelationshipService::force_refresh`].
    ///
    /// Returns `false` when a repair is already queued and has not yet taken
    /// the write lock; that one will read the backend state anyway.
    pub fn schedule_refresh(self: &Arc<Self>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if self
            .repair_scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = this.cancel.cancelled() => {
                    tracing::debug!("repair for {} cancelled", this.me);
                }
                result = this.repair() => {
                    if let Err(e) = result {
                        tracing::warn!("background repair for {} failed: {e}", this.me);
                    }
                }
            }
        });
        true
    }

    /// Stops queued background repairs. Calls already holding the write lock finish.
    pub fn shutdown(&self) {
        tracing::info!("coordinator for {} shutting down", self.me);
        self.cancel.cancel();
    }

    async fn repair(&self) -> Result<Arc<FriendshipSnapshot>, EdgeStoreError> {
        let mut generation = self.write_lock.lock().await;
        // requests arriving from here on need a listing taken after this one
        self.repair_scheduled.store(false, Ordering::Release);
        self.reconcile_locked(&mut generation).await
    }

    async fn reconcile_locked(
        &self,
        generation: &mut u64,
    ) -> Result<Arc<FriendshipSnapshot>, EdgeStoreError> {
        let (friend_ids, pending) = tokio::try_join!(
            self.edge_store.list_friend_ids(self.me),
            self.edge_store.list_pending_requests(self.me),
        )?;

        *generation += 1;
        let snapshot = Arc::new(FriendshipSnapshot::build(
            self.me,
            friend_ids,
            pending,
            *generation,
        ));
        let notified = self
            .cache
            .replace(snapshot.clone(), self.config.notify_on_unchanged);

        tracing::debug!(
            user = %self.me,
            generation = *generation,
            friends = snapshot.friend_count(),
            outgoing = snapshot.outgoing_requests().len(),
            incoming = snapshot.incoming_requests().len(),
            notified,
            "snapshot replaced"
        );
        Ok(snapshot)
    }

    /// Runs `change` and, if it succeeds, a reconciliation on a detached task,
    /// then waits for that task.
    async fn mutate<T, F, Fut>(&self, op: &'static str, change: F) -> Result<T, RelationError>
    where
        F: FnOnce(Arc<Self>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, EdgeStoreError>> + Send + 'static,
        T: Send + 'static,
    {
        let this = self
            .this
            .upgrade()
            .ok_or_else(|| RelationError::TransportFailure(format!("{op}: coordinator dropped")))?;

        match tokio::spawn(this.mutate_locked(op, change)).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(RelationError::TransportFailure(format!("{op} aborted: {e}"))),
        }
    }

    async fn mutate_locked<T, F, Fut>(
        self: Arc<Self>,
        op: &'static str,
        change: F,
    ) -> Result<T, RelationError>
    where
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = Result<T, EdgeStoreError>>,
    {
        let mut generation = self.write_lock.lock().await;
        tracing::debug!(user = %self.me, op, "mutation started");

        let value = change(Arc::clone(&self)).await.map_err(|e| {
            tracing::warn!(user = %self.me, op, "mutation failed: {e}");
            RelationError::from(e)
        })?;

        self.reconcile_locked(&mut generation).await.map_err(|e| {
            tracing::warn!(user = %self.me, op, "reconcile after mutation failed: {e}");
            RelationError::ReconcileFailed(e.to_string())
        })?;
        Ok(value)
    }

    fn warn_if_not_addressed(&self, request: &FriendRequest) {
        match request.counterpart(self.me) {
            None => tracing::warn!(
                "{} resolved request {} between {} and {}",
                self.me,
                request.id,
                request.from_id,
                request.to_id
            ),
            Some(other) if request.from_id == self.me => tracing::warn!(
                "{} resolved own outgoing request {} to {other}",
                self.me,
                request.id
            ),
            Some(_) => {}
        }
    }

    async fn accept_pending(&self, request_id: RequestId) -> Result<(), EdgeStoreError> {
        let request = self.edge_store.get_request(request_id).await?;
        if request.status.is_terminal() {
            return Err(EdgeStoreError::AlreadyTerminal);
        }
        self.warn_if_not_addressed(&request);

        // edges first, so a failure at either step leaves the request pending
        self.edge_store
            .insert_edges_both_directions(request.from_id, request.to_id)
            .await?;
        self.edge_store
            .set_request_status(request_id, RequestStatus::Accepted)
            .await?;
        Ok(())
    }

    async fn reject_pending(&self, request_id: RequestId) -> Result<(), EdgeStoreError> {
        let request = self
            .edge_store
            .set_request_status(request_id, RequestStatus::Rejected)
            .await?;
        self.warn_if_not_addressed(&request);
        Ok(())
    }
}

#[async_trait::async_trait]
impl RelationshipService for ConsistencyCoordinator {
    async fn send_request(&self, to: UserId) -> Result<RequestId, RelationError> {
        if to == self.me {
            return Err(RelationError::SelfRequest);
        }
        self.mutate("send_request", move |this| async move {
            this.edge_store.send_request(this.me, to).await
        })
        .await
    }

    async fn accept_request(&self, request_id: RequestId) -> Result<(), RelationError> {
        self.mutate("accept_request", move |this| async move {
            this.accept_pending(request_id).await
        })
        .await
    }

    async fn reject_request(&self, request_id: RequestId) -> Result<(), RelationError> {
        self.mutate("reject_request", move |this| async move {
            this.reject_pending(request_id).await
        })
        .await
    }

    async fn cancel_request(&self, request_id: RequestId) -> Result<(), RelationError> {
        self.mutate("cancel_request", move |this| async move {
            this.edge_store.delete_request(request_id).await
        })
        .await
    }

    async fn remove_friend(&self, user_id: UserId) -> Result<(), RelationError> {
        if user_id == self.me {
            return Err(RelationError::SelfRequest);
        }
        self.mutate("remove_friend", move |this| async move {
            this.edge_store
                .delete_edges_both_directions(this.me, user_id)
                .await
        })
        .await
    }

    async fn force_refresh(&self) -> Result<Arc<FriendshipSnapshot>, RelationError> {
        self.reconcile().await
    }
}
