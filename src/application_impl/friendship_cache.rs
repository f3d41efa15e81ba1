use crate::domain_model::FriendshipSnapshot;
use std::sync::Arc;
use tokio::sync::watch;

/// Holder of the current [`FriendshipSnapshot`].
///
/// Cloning yields another handle to the same cache. Readers get the latest
/// snapshot as an `Arc` and never see a partially built one; only the
/// coordinator that created the cache can swap in a new snapshot.
#[derive(Clone)]
pub struct FriendshipCache {
    tx: Arc<watch::Sender<Arc<FriendshipSnapshot>>>,
}

impl FriendshipCache {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(FriendshipSnapshot::empty()));
        Self { tx: Arc::new(tx) }
    }

    pub fn current_snapshot(&self) -> Arc<FriendshipSnapshot> {
        self.tx.borrow().clone()
    }

    /// Receiver that is marked changed whenever a snapshot is replaced.
    ///
    /// Notifications are best-effort and may repeat for an unchanged view.
    pub fn subscribe(&self) -> watch::Receiver<Arc<FriendshipSnapshot>> {
        self.tx.subscribe()
    }

    /// Swaps in `snapshot` and returns whether subscribers were notified.
    ///
    /// The swap always happens; with `notify_unchanged` off, subscribers are
    /// only woken when the visible relationships differ from the previous snapshot.
    pub(crate) fn replace(&self, snapshot: Arc<FriendshipSnapshot>, notify_unchanged: bool) -> bool {
        self.tx.send_if_modified(|current| {
            let changed = !current.same_view(&snapshot);
            *current = snapshot;
            changed || notify_unchanged
        })
    }
}
