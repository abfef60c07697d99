//! Ticker for the engine's repeating polls with cancellation support.
//!
//! Runs a callback on a fixed interval until stopped. Stopping only cancels
//! the token; it never waits for the running task, so a tick callback may
//! stop its own ticker (the liveness poll does exactly that when the target
//! disappears).

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Minimal ticker core: schedules a closure on each interval tick.
#[derive(Clone, Default)]
pub struct Ticker {
    entries: Arc<Mutex<HashMap<&'static str, CancellationToken>>>,
}

impl Ticker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a ticker is active for the given id.
    pub fn is_active(&self, id: &'static str) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Start or replace a ticker for `id` firing every `interval`.
    pub fn start<F>(&self, id: &'static str, interval: Duration, mut on_tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.stop(id);

        let token = CancellationToken::new();
        let cancel = token.clone();
        self.entries.lock().insert(id, token);

        tokio::spawn(async move {
            trace!(ticker = id, int_ms = interval.as_millis() as u64, "ticker_start");
            let mut tick = time::interval(interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first interval tick completes immediately; skip it so the
            // callback first fires one full interval after start.
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => on_tick(),
                }
            }
            trace!(ticker = id, "ticker_end");
        });
    }

    /// Cancel the ticker for `id`, if any. Does not wait for the task.
    pub fn stop(&self, id: &'static str) {
        if let Some(token) = self.entries.lock().remove(id) {
            token.cancel();
        }
    }

    /// Cancel everything.
    pub fn stop_all(&self) {
        for (_, token) in self.entries.lock().drain() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn ticks_until_stopped() {
        let ticker = Ticker::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        ticker.start("t", Duration::from_millis(10), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(ticker.is_active("t"));
        time::sleep(Duration::from_millis(55)).await;
        ticker.stop("t");
        let n = count.load(Ordering::SeqCst);
        assert!(n >= 2, "expected at least 2 ticks, got {n}");
        time::sleep(Duration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), n, "ticks after stop");
        assert!(!ticker.is_active("t"));
    }

    #[tokio::test]
    async fn restarting_replaces_the_previous_task() {
        let ticker = Ticker::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let c = count.clone();
            ticker.start("t", Duration::from_millis(10), move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        time::sleep(Duration::from_millis(35)).await;
        ticker.stop_all();
        // A single live task: roughly one tick per 10ms window, not three.
        assert!(count.load(Ordering::SeqCst) <= 5);
    }
}
