//! Cancellable single-shot delayed task.
//!
//! Each `schedule` call aborts the previously armed task and arms a new
//! one, so a burst of rapid edits collapses into the single task armed
//! last. This is a timer that is reset on every call, not an interval
//! loop.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A debounced, cancellable timer on the tokio runtime.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    armed: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    /// Create a debouncer with a fixed delay.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            armed: Mutex::new(None),
        }
    }

    /// The configured delay.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm `work` to run after the delay, disarming any previously armed
    /// task that has not fired yet. Once the timer fires, the work is
    /// detached and runs to completion: a request already sent cannot be
    /// cancelled by a later `schedule` or `cancel`.
    pub fn schedule<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(work);
        });

        let mut armed = self.armed.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(previous) = armed.replace(task) {
            previous.abort();
        }
    }

    /// Disarm the pending task, if any.
    pub fn cancel(&self) {
        let mut armed = self.armed.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(task) = armed.take() {
            task.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn bump(counter: &Arc<AtomicU32>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let fired = Arc::new(AtomicU32::new(0));

        debouncer.schedule(bump(&fired));

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_resets_the_timer() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let fired = Arc::new(AtomicU32::new(0));

        for _ in 0..5 {
            debouncer.schedule(bump(&fired));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        // Five rapid edits, none older than the delay: nothing fired yet
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(500)).await;
        // ...and exactly one task survives the burst
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_work_survives_cancel() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let fired = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&fired);
        debouncer.schedule(async move {
            // Stands in for a request already on the wire
            tokio::time::sleep(Duration::from_millis(200)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // Timer fired at 500ms; the work is now in flight
        tokio::time::sleep(Duration::from_millis(600)).await;
        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_disarms() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let fired = Arc::new(AtomicU32::new(0));

        debouncer.schedule(bump(&fired));
        debouncer.cancel();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
