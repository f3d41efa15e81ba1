use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::Duration;

/// Operations of [`EdgeStore`], used to target injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeOp {
    SendRequest,
    GetRequest,
    SetRequestStatus,
    DeleteRequest,
    InsertEdges,
    DeleteEdges,
    ListFriendIds,
    ListPendingRequests,
    RemoteStatus,
}

#[derive(Default)]
struct MemoryState {
    requests: BTreeMap<RequestId, FriendRequest>,
    edges: BTreeMap<(UserId, UserId), FriendEdge>,
}

impl MemoryState {
    fn are_friends(&self, a: UserId, b: UserId) -> bool {
        self.edges.contains_key(&(a, b)) && self.edges.contains_key(&(b, a))
    }

    fn pending_between(&self, from: UserId, to: UserId) -> Option<RequestId> {
        self.requests
            .values()
            .find(|r| r.from_id == from && r.to_id == to && r.status == RequestStatus::Pending)
            .map(|r| r.id)
    }
}

/// In-process authoritative store.
///
/// Shared by every coordinator of a test or demo run, so two sessions see the
/// same backend. State lives behind one mutex, which makes each operation
/// atomic the way a single database statement or transaction would be.
pub struct MemoryEdgeStore {
    state: Mutex<MemoryState>,
    faults: DashMap<EdgeOp, EdgeStoreError>,
    latency: Option<Duration>,
}

impl MemoryEdgeStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            faults: DashMap::new(),
            latency: None,
        }
    }

    /// Every call sleeps for `latency` before touching state.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::new()
        }
    }

    /// The next call of `op` fails with `error`, once.
    pub fn fail_next(&self, op: EdgeOp, error: EdgeStoreError) {
        self.faults.insert(op, error);
    }

    /// Seeds a single directed edge, as left behind by an older client.
    pub fn insert_one_way_edge(&self, owner_id: UserId, friend_id: UserId) -> anyhow::Result<()> {
        let mut state = self.lock()?;
        state.edges.insert(
            (owner_id, friend_id),
            FriendEdge {
                owner_id,
                friend_id,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    pub fn edge_exists(&self, owner_id: UserId, friend_id: UserId) -> bool {
        self.lock()
            .map(|state| state.edges.contains_key(&(owner_id, friend_id)))
            .unwrap_or(false)
    }

    pub fn request(&self, request_id: RequestId) -> Option<FriendRequest> {
        self.lock()
            .ok()
            .and_then(|state| state.requests.get(&request_id).cloned())
    }

    async fn enter(&self, op: EdgeOp) -> Result<(), EdgeStoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.faults.remove(&op) {
            Some((_, error)) => {
                tracing::debug!("injected fault on {op:?}: {error}");
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, EdgeStoreError> {
        self.state
            .lock()
            .map_err(|e| EdgeStoreError::Transport(format!("memory store poisoned: {e}")))
    }
}

impl Default for MemoryEdgeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EdgeStore for MemoryEdgeStore {
    async fn send_request(&self, from: UserId, to: UserId) -> Result<RequestId, EdgeStoreError> {
        self.enter(EdgeOp::SendRequest).await?;
        if from == to {
            return Err(EdgeStoreError::SelfRequest);
        }

        let mut state = self.lock()?;
        if state.are_friends(from, to) {
            return Err(EdgeStoreError::AlreadyFriends);
        }
        if state.pending_between(from, to).is_some() {
            return Err(EdgeStoreError::DuplicatePending);
        }

        let now = Utc::now();
        let request = FriendRequest {
            id: RequestId::new_v4(),
            from_id: from,
            to_id: to,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let id = request.id;
        state.requests.insert(id, request);
        Ok(id)
    }

    async fn get_request(&self, request_id: RequestId) -> Result<FriendRequest, EdgeStoreError> {
        self.enter(EdgeOp::GetRequest).await?;

        let state = self.lock()?;
        state
            .requests
            .get(&request_id)
            .cloned()
            .ok_or(EdgeStoreError::NotFound)
    }

    async fn set_request_status(
        &self,
        request_id: RequestId,
        status: RequestStatus,
    ) -> Result<FriendRequest, EdgeStoreError> {
        self.enter(EdgeOp::SetRequestStatus).await?;

        let mut state = self.lock()?;
        let request = state
            .requests
            .get_mut(&request_id)
            .ok_or(EdgeStoreError::NotFound)?;
        if request.status.is_terminal() {
            return Err(EdgeStoreError::AlreadyTerminal);
        }
        if request.status != status {
            request.status = status;
            request.updated_at = Utc::now();
        }
        Ok(request.clone())
    }

    async fn delete_request(&self, request_id: RequestId) -> Result<(), EdgeStoreError> {
        self.enter(EdgeOp::DeleteRequest).await?;

        let mut state = self.lock()?;
        match state.requests.get(&request_id) {
            None => Err(EdgeStoreError::NotFound),
            Some(request) if request.status.is_terminal() => Err(EdgeStoreError::AlreadyTerminal),
            Some(_) => {
                state.requests.remove(&request_id);
                Ok(())
            }
        }
    }

    async fn insert_edges_both_directions(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<(), EdgeStoreError> {
        self.enter(EdgeOp::InsertEdges).await?;
        if a == b {
            return Err(EdgeStoreError::SelfRequest);
        }

        let mut state = self.lock()?;
        let now = Utc::now();
        for (owner_id, friend_id) in [(a, b), (b, a)] {
            state
                .edges
                .entry((owner_id, friend_id))
                .or_insert(FriendEdge {
                    owner_id,
                    friend_id,
                    created_at: now,
                });
        }
        Ok(())
    }

    async fn delete_edges_both_directions(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<(), EdgeStoreError> {
        self.enter(EdgeOp::DeleteEdges).await?;

        let mut state = self.lock()?;
        state.edges.remove(&(a, b));
        state.edges.remove(&(b, a));
        Ok(())
    }

    async fn list_friend_ids(&self, user_id: UserId) -> Result<BTreeSet<UserId>, EdgeStoreError> {
        self.enter(EdgeOp::ListFriendIds).await?;

        let state = self.lock()?;
        Ok(state
            .edges
            .keys()
            .filter(|(owner, friend)| *owner == user_id && state.edges.contains_key(&(*friend, *owner)))
            .map(|(_, friend)| *friend)
            .collect())
    }

    async fn list_pending_requests(
        &self,
        user_id: UserId,
    ) -> Result<PendingRequests, EdgeStoreError> {
        self.enter(EdgeOp::ListPendingRequests).await?;

        let state = self.lock()?;
        let mut pending = PendingRequests::default();
        for request in state
            .requests
            .values()
            .filter(|r| r.status == RequestStatus::Pending)
        {
            if request.to_id == user_id {
                pending.incoming.insert(request.from_id, request.id);
            } else if request.from_id == user_id {
                pending.outgoing.insert(request.to_id, request.id);
            }
        }
        Ok(pending)
    }

    async fn remote_status(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<FriendshipStatus, EdgeStoreError> {
        self.enter(EdgeOp::RemoteStatus).await?;
        if a == b {
            return Ok(FriendshipStatus::None);
        }

        let state = self.lock()?;
        if state.are_friends(a, b) {
            return Ok(FriendshipStatus::Friends);
        }
        if let Some(id) = state.pending_between(a, b) {
            return Ok(FriendshipStatus::OutgoingRequest(id));
        }
        if let Some(id) = state.pending_between(b, a) {
            return Ok(FriendshipStatus::IncomingRequest(id));
        }
        Ok(FriendshipStatus::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_request_rules() {
        let store = MemoryEdgeStore::new();
        let (a, b) = (UserId::new_v4(), UserId::new_v4());

        assert!(matches!(
            store.send_request(a, a).await,
            Err(EdgeStoreError::SelfRequest)
        ));

        let id = store.send_request(a, b).await.unwrap();
        assert!(matches!(
            store.send_request(a, b).await,
            Err(EdgeStoreError::DuplicatePending)
        ));

        // the reverse direction is a different ordered pair
        let reverse = store.send_request(b, a).await.unwrap();
        assert_ne!(id, reverse);

        store.insert_edges_both_directions(a, b).await.unwrap();
        store.delete_request(id).await.unwrap();
        assert!(matches!(
            store.send_request(a, b).await,
            Err(EdgeStoreError::AlreadyFriends)
        ));
    }

    #[tokio::test]
    async fn test_request_transitions() {
        let store = MemoryEdgeStore::new();
        let (a, b) = (UserId::new_v4(), UserId::new_v4());
        let id = store.send_request(a, b).await.unwrap();

        assert_eq!(store.get_request(id).await.unwrap().from_id, a);
        assert!(matches!(
            store.get_request(RequestId::new_v4()).await,
            Err(EdgeStoreError::NotFound)
        ));

        let updated = store
            .set_request_status(id, RequestStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(updated.status, RequestStatus::Rejected);
        assert!(matches!(
            store.set_request_status(id, RequestStatus::Accepted).await,
            Err(EdgeStoreError::AlreadyTerminal)
        ));
        assert!(matches!(
            store.delete_request(id).await,
            Err(EdgeStoreError::AlreadyTerminal)
        ));
        assert!(matches!(
            store
                .set_request_status(RequestId::new_v4(), RequestStatus::Accepted)
                .await,
            Err(EdgeStoreError::NotFound)
        ));

        // a rejected request no longer blocks a new one
        store.send_request(a, b).await.unwrap();
    }

    #[tokio::test]
    async fn test_edges_and_listings() {
        let store = MemoryEdgeStore::new();
        let (a, b, c) = (UserId::new_v4(), UserId::new_v4(), UserId::new_v4());

        store.insert_edges_both_directions(a, b).await.unwrap();
        store.insert_edges_both_directions(b, a).await.unwrap();
        store.insert_one_way_edge(a, c).unwrap();

        assert_eq!(store.list_friend_ids(a).await.unwrap(), BTreeSet::from([b]));
        assert_eq!(store.list_friend_ids(b).await.unwrap(), BTreeSet::from([a]));
        assert_eq!(
            store.remote_status(a, c).await.unwrap(),
            FriendshipStatus::None
        );

        let r = store.send_request(c, a).await.unwrap();
        let pending = store.list_pending_requests(a).await.unwrap();
        assert_eq!(pending.incoming.get(&c), Some(&r));
        assert!(pending.outgoing.is_empty());
        assert_eq!(
            store.remote_status(a, c).await.unwrap(),
            FriendshipStatus::IncomingRequest(r)
        );
        assert_eq!(
            store.remote_status(c, a).await.unwrap(),
            FriendshipStatus::OutgoingRequest(r)
        );

        store.delete_edges_both_directions(b, a).await.unwrap();
        assert!(!store.edge_exists(a, b));
        assert!(!store.edge_exists(b, a));
    }

    #[tokio::test]
    async fn test_fail_next_fires_once() {
        let store = MemoryEdgeStore::new();
        let a = UserId::new_v4();

        store.fail_next(
            EdgeOp::ListFriendIds,
            EdgeStoreError::Transport("connection reset".into()),
        );
        assert!(matches!(
            store.list_friend_ids(a).await,
            Err(EdgeStoreError::Transport(_))
        ));
        assert!(store.list_friend_ids(a).await.unwrap().is_empty());
    }
}
