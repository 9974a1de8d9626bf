//! Periodic eviction of pre-requests that were never looked up.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::correlator::Correlator;

/// `interval_at` rejects a zero period.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

impl Correlator {
    /// Spawn the background sweep loop.
    ///
    /// Runs every `sweep_interval` until [`Correlator::shutdown`] or until the
    /// last `Arc` to the correlator is dropped.
    pub fn start_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let period = self.timings.sweep_interval.max(MIN_SWEEP_INTERVAL);
        let correlator = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();

        let first_tick = Instant::now() + period;

        self.runtime.spawn(async move {
            let mut ticker = interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    now = ticker.tick() => {
                        let Some(correlator) = correlator.upgrade() else {
                            break;
                        };
                        correlator.sweep_expired(now);
                    }
                }
            }
            debug!(target: "prelink::sweeper", "Sweeper stopped");
        })
    }

    /// Evict every cached pre-request expired at `now`. Returns how many.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let evicted = self.lock_state().pre_requests.evict_expired(now);
        if evicted.is_empty() {
            return 0;
        }

        self.metrics
            .record_unmatched_pre_requests(evicted.len() as u64);

        for (key, entry) in &evicted {
            trace!(
                target: "prelink::sweeper",
                key = %key,
                resource_type = entry.event.resource_type().unwrap_or("-"),
                "Timed out unmatched pre-request"
            );
        }
        debug!(
            target: "prelink::sweeper",
            evicted = evicted.len(),
            "Swept expired pre-requests"
        );

        evicted.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::time::{sleep, Duration, Instant};

    use crate::correlator::{Correlator, Timings};
    use crate::event::BrowserPreRequest;

    #[tokio::test(start_paused = true)]
    async fn sweep_expired_respects_cache_age() {
        let c = Correlator::new(Timings::default());
        let t0 = Instant::now();
        c.add_pre_request(BrowserPreRequest::new("GET", "http://x/a"));

        assert_eq!(c.sweep_expired(t0 + Duration::from_millis(9_999)), 0);
        assert_eq!(c.pending_pre_requests(), 1);

        assert_eq!(c.sweep_expired(t0 + Duration::from_millis(10_000)), 1);
        assert_eq!(c.pending_pre_requests(), 0);
        assert_eq!(c.snapshot().unmatched_pre_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unconsumed_pre_request_is_bounded() {
        let c = Correlator::start(Timings::default());
        c.add_pre_request(BrowserPreRequest::new("GET", "http://x/never"));

        sleep(Duration::from_millis(9_999)).await;
        assert_eq!(c.pending_pre_requests(), 1);

        // max_cache_age + sweep_interval
        sleep(Duration::from_millis(2_002)).await;
        assert_eq!(c.pending_pre_requests(), 0);
        assert_eq!(c.snapshot().unmatched_pre_requests, 1);

        sleep(Duration::from_millis(10_000)).await;
        assert_eq!(c.snapshot().unmatched_pre_requests, 1);
        c.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn custom_interval_is_honored() {
        let timings = Timings {
            request_timeout: Duration::from_millis(500),
            max_cache_age: Duration::from_millis(100),
            sweep_interval: Duration::from_millis(50),
        };
        let c = Correlator::start(timings);
        c.add_pre_request(BrowserPreRequest::new("GET", "http://x/a"));

        sleep(Duration::from_millis(151)).await;
        assert_eq!(c.pending_pre_requests(), 0);
        c.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_on_shutdown() {
        let c = Arc::new(Correlator::new(Timings::default()));
        let handle = c.start_sweeper();
        c.shutdown();
        handle.await.expect("sweeper task");
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_when_correlator_dropped() {
        let c = Arc::new(Correlator::new(Timings::default()));
        let handle = c.start_sweeper();
        drop(c);
        handle.await.expect("sweeper task");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_still_sweeps() {
        let timings = Timings {
            request_timeout: Duration::from_millis(500),
            max_cache_age: Duration::from_millis(10),
            sweep_interval: Duration::ZERO,
        };
        let c = Correlator::start(timings);
        c.add_pre_request(BrowserPreRequest::new("GET", "http://x/a"));

        sleep(Duration::from_millis(12)).await;
        assert_eq!(c.pending_pre_requests(), 0);
        assert_eq!(c.snapshot().unmatched_pre_requests, 1);
        c.shutdown();
    }
}
