//! State synchronization: debounced pushes with monotonic timestamps.
//!
//! Every generic order-state mutation schedules a debounced push; each
//! push carries a `last_update` timestamp that is strictly increasing
//! within the session, so the server can reject out-of-order writes from
//! concurrent tabs or devices. A rejected (stale) push is non-fatal: the
//! local state that lost was already superseded server-side, so it is
//! only counted and logged.

pub mod debounce;

pub use debounce::Debouncer;

use std::future::Future;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Timestamp issuance and push scheduling for one checkout session.
#[derive(Debug)]
pub struct Synchronizer {
    debouncer: Debouncer,
    last_update: AtomicI64,
    stale_writes: AtomicU64,
}

impl Synchronizer {
    /// Create a synchronizer with the given debounce delay.
    #[must_use]
    pub const fn new(debounce_delay: Duration) -> Self {
        Self {
            debouncer: Debouncer::new(debounce_delay),
            last_update: AtomicI64::new(0),
            stale_writes: AtomicU64::new(0),
        }
    }

    /// Issue the timestamp for the next push: wall-clock seconds, forced
    /// strictly above every timestamp issued or observed before, so two
    /// pushes within the same second still order correctly.
    pub fn next_timestamp(&self) -> i64 {
        let now = chrono::Utc::now().timestamp();
        self.last_update
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .map_or(now, |prev| now.max(prev + 1))
    }

    /// Raise the timestamp floor to one the server reported (from a pull
    /// or an accepted push), so the next local push sorts after it.
    pub fn observe_server_timestamp(&self, server_last_update: i64) {
        self.last_update
            .fetch_max(server_last_update, Ordering::SeqCst);
    }

    /// Count and log a server-rejected stale push. The end user sees
    /// nothing: their local state was already the most recent on this
    /// device.
    pub fn record_stale_write(&self) {
        let total = self.stale_writes.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(total, "state push rejected as stale, keeping local state");
    }

    /// How many pushes the server has rejected as stale this session.
    #[must_use]
    pub fn stale_write_count(&self) -> u64 {
        self.stale_writes.load(Ordering::Relaxed)
    }

    /// Schedule a debounced push, superseding any pending one.
    pub fn schedule<F>(&self, push: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.debouncer.schedule(push);
    }

    /// Drop any pending debounced push (used before an immediate push at
    /// submission).
    pub fn cancel_pending(&self) {
        self.debouncer.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_strictly_increase() {
        let sync = Synchronizer::new(Duration::from_millis(500));
        let a = sync.next_timestamp();
        let b = sync.next_timestamp();
        let c = sync.next_timestamp();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_observed_server_timestamp_raises_floor() {
        let sync = Synchronizer::new(Duration::from_millis(500));
        let far_future = chrono::Utc::now().timestamp() + 10_000;
        sync.observe_server_timestamp(far_future);
        assert!(sync.next_timestamp() > far_future);
    }

    #[test]
    fn test_stale_write_counter() {
        let sync = Synchronizer::new(Duration::from_millis(500));
        assert_eq!(sync.stale_write_count(), 0);
        sync.record_stale_write();
        sync.record_stale_write();
        assert_eq!(sync.stale_write_count(), 2);
    }
}
