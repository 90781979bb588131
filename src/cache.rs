use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::common::types::Snapshot;
use crate::observability::metrics;

#[derive(Default)]
struct Slot {
    /// Last live snapshot, served until it expires
    stored: Option<Arc<Snapshot>>,
    /// Result of the most recent refresh, live or failed
    last_refresh: Option<Arc<Snapshot>>,
}

/// Holds the most recent snapshot for `ttl`.
///
/// The slot lock is held while a refresh runs. Callers that queued on the
/// lock during a refresh share its result, failed or not, instead of issuing
/// their own upstream request. Failed snapshots are never served to callers
/// that arrive after the refresh finished.
pub struct SnapshotCache {
    ttl: Duration,
    refreshes: AtomicU64,
    slot: Mutex<Slot>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            refreshes: AtomicU64::new(0),
            slot: Mutex::new(Slot::default()),
        }
    }

    pub async fn get_or_refresh<F, Fut>(&self, load: F) -> Arc<Snapshot>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Snapshot>,
    {
        self.get_or_refresh_at(Utc::now(), load).await
    }

    /// Same as [`get_or_refresh`](Self::get_or_refresh) with an explicit
    /// clock reading.
    pub async fn get_or_refresh_at<F, Fut>(&self, now: DateTime<Utc>, load: F) -> Arc<Snapshot>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Snapshot>,
    {
        let seen = self.refreshes.load(Ordering::Acquire);
        let mut slot = self.slot.lock().await;

        // A refresh completed while we waited for the lock
        if self.refreshes.load(Ordering::Acquire) != seen {
            if let Some(shared) = slot.last_refresh.as_ref() {
                metrics::cache::hit();
                debug!("Sharing snapshot from the refresh that just finished");
                return Arc::clone(shared);
            }
        }

        if let Some(cached) = slot.stored.as_ref() {
            if self.is_fresh(cached, now) {
                metrics::cache::hit();
                debug!("Serving cached snapshot from {}", cached.fetched_at);
                return Arc::clone(cached);
            }
        }

        metrics::cache::miss();
        let fresh = Arc::new(load().await);
        if fresh.is_failed() {
            debug!("Fetch failed; keeping previous cache state");
        } else {
            slot.stored = Some(Arc::clone(&fresh));
        }
        slot.last_refresh = Some(Arc::clone(&fresh));
        self.refreshes.fetch_add(1, Ordering::Release);
        fresh
    }

    /// An expiry past the end of representable time never comes.
    fn is_fresh(&self, cached: &Snapshot, now: DateTime<Utc>) -> bool {
        cached
            .fetched_at
            .checked_add_signed(self.ttl)
            .map_or(true, |expires| expires > now)
    }

    /// The stored snapshot regardless of age
    pub async fn peek(&self) -> Option<Arc<Snapshot>> {
        self.slot.lock().await.stored.clone()
    }

    pub async fn invalidate(&self) {
        let mut slot = self.slot.lock().await;
        slot.stored = None;
        slot.last_refresh = None;
    }
}
