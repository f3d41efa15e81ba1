use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Immutable view of one user's friendships and pending requests.
///
/// A snapshot is built in one piece from a complete backend listing and is
/// never edited afterwards; the cache swaps whole snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct FriendshipSnapshot {
    friend_ids: BTreeSet<UserId>,
    outgoing_requests: BTreeMap<UserId, RequestId>,
    incoming_requests: BTreeMap<UserId, RequestId>,
    synced_at: DateTime<Utc>,
    generation: u64,
}

/// The part of a snapshot consumers can observe, without sync metadata.
#[derive(Serialize)]
struct SnapshotView<'a> {
    friend_ids: &'a BTreeSet<UserId>,
    outgoing_requests: &'a BTreeMap<UserId, RequestId>,
    incoming_requests: &'a BTreeMap<UserId, RequestId>,
}

impl FriendshipSnapshot {
    /// The snapshot a cache holds before its first reconciliation.
    pub fn empty() -> Self {
        Self {
            friend_ids: BTreeSet::new(),
            outgoing_requests: BTreeMap::new(),
            incoming_requests: BTreeMap::new(),
            synced_at: DateTime::<Utc>::UNIX_EPOCH,
            generation: 0,
        }
    }

    /// Builds a snapshot for `me` from a full backend listing.
    ///
    /// Established friends win over pending rows for the same user, and rows
    /// that point back at `me` are dropped.
    pub(crate) fn build(
        me: UserId,
        mut friend_ids: BTreeSet<UserId>,
        pending: PendingRequests,
        generation: u64,
    ) -> Self {
        if friend_ids.remove(&me) {
            tracing::warn!("dropping self from friend list of {me}");
        }

        let PendingRequests {
            mut incoming,
            mut outgoing,
        } = pending;
        for map in [&mut incoming, &mut outgoing] {
            map.retain(|user, request| {
                if *user == me {
                    tracing::warn!("dropping self-addressed request {request} of {me}");
                    return false;
                }
                if friend_ids.contains(user) {
                    tracing::debug!("dropping stale request {request}: {user} is already a friend");
                    return false;
                }
                true
            });
        }

        Self {
            friend_ids,
            outgoing_requests: outgoing,
            incoming_requests: incoming,
            synced_at: Utc::now(),
            generation,
        }
    }

    pub fn friend_ids(&self) -> &BTreeSet<UserId> {
        &self.friend_ids
    }

    pub fn outgoing_requests(&self) -> &BTreeMap<UserId, RequestId> {
        &self.outgoing_requests
    }

    pub fn incoming_requests(&self) -> &BTreeMap<UserId, RequestId> {
        &self.incoming_requests
    }

    pub fn synced_at(&self) -> DateTime<Utc> {
        self.synced_at
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_friend(&self, user_id: &UserId) -> bool {
        self.friend_ids.contains(user_id)
    }

    pub fn friend_count(&self) -> usize {
        self.friend_ids.len()
    }

    /// Cache-only classification: friends, then outgoing, then incoming.
    /// `None` means the snapshot knows nothing about `user_id`.
    pub fn status_of(&self, user_id: &UserId) -> Option<FriendshipStatus> {
        if self.friend_ids.contains(user_id) {
            Some(FriendshipStatus::Friends)
        } else if let Some(id) = self.outgoing_requests.get(user_id) {
            Some(FriendshipStatus::OutgoingRequest(*id))
        } else {
            self.incoming_requests
                .get(user_id)
                .map(|id| FriendshipStatus::IncomingRequest(*id))
        }
    }

    /// True when both snapshots show the same relationships, ignoring when they were taken.
    pub fn same_view(&self, other: &FriendshipSnapshot) -> bool {
        self.friend_ids == other.friend_ids
            && self.outgoing_requests == other.outgoing_requests
            && self.incoming_requests == other.incoming_requests
    }

    /// Canonical JSON of the observable view; equal views encode to equal bytes.
    pub fn view_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&SnapshotView {
            friend_ids: &self.friend_ids,
            outgoing_requests: &self.outgoing_requests,
            incoming_requests: &self.incoming_requests,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(
        incoming: &[(UserId, RequestId)],
        outgoing: &[(UserId, RequestId)],
    ) -> PendingRequests {
        PendingRequests {
            incoming: incoming.iter().copied().collect(),
            outgoing: outgoing.iter().copied().collect(),
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = FriendshipSnapshot::empty();
        assert_eq!(snapshot.friend_count(), 0);
        assert_eq!(snapshot.generation(), 0);
        assert_eq!(snapshot.status_of(&UserId::new_v4()), None);
    }

    #[test]
    fn test_status_of_order() {
        let me = UserId::new_v4();
        let friend = UserId::new_v4();
        let sent_to = UserId::new_v4();
        let received_from = UserId::new_v4();
        let (r1, r2) = (RequestId::new_v4(), RequestId::new_v4());

        let snapshot = FriendshipSnapshot::build(
            me,
            BTreeSet::from([friend]),
            pending(&[(received_from, r2)], &[(sent_to, r1)]),
            1,
        );

        assert_eq!(snapshot.status_of(&friend), Some(FriendshipStatus::Friends));
        assert_eq!(
            snapshot.status_of(&sent_to),
            Some(FriendshipStatus::OutgoingRequest(r1))
        );
        assert_eq!(
            snapshot.status_of(&received_from),
            Some(FriendshipStatus::IncomingRequest(r2))
        );
        assert_eq!(snapshot.status_of(&UserId::new_v4()), None);
    }

    #[test]
    fn test_build_drops_requests_shadowed_by_friendship() {
        let me = UserId::new_v4();
        let friend = UserId::new_v4();

        let snapshot = FriendshipSnapshot::build(
            me,
            BTreeSet::from([friend, me]),
            pending(
                &[(friend, RequestId::new_v4()), (me, RequestId::new_v4())],
                &[(friend, RequestId::new_v4())],
            ),
            7,
        );

        assert_eq!(snapshot.friend_ids(), &BTreeSet::from([friend]));
        assert!(snapshot.incoming_requests().is_empty());
        assert!(snapshot.outgoing_requests().is_empty());
        assert_eq!(snapshot.generation(), 7);
    }

    #[test]
    fn test_view_json_ignores_sync_metadata() {
        let me = UserId::new_v4();
        let friend = UserId::new_v4();
        let request = RequestId::new_v4();
        let other = UserId::new_v4();

        let a = FriendshipSnapshot::build(
            me,
            BTreeSet::from([friend]),
            pending(&[], &[(other, request)]),
            1,
        );
        let b = FriendshipSnapshot::build(
            me,
            BTreeSet::from([friend]),
            pending(&[], &[(other, request)]),
            2,
        );

        assert!(a.same_view(&b));
        assert_eq!(a.view_json().unwrap(), b.view_json().unwrap());
        assert!(!a.same_view(&FriendshipSnapshot::empty()));
    }
}
