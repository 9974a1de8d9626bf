//! Pairs browser pre-requests with the proxied requests they announce.
//!
//! Per key the correlator is either empty, holding a cached pre-request, or
//! holding a waiting lookup. The complementary event, the waiter's timeout,
//! or a sweep returns the key to empty.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use prelink_config::CorrelatorConfig;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::{sleep_until, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::entry::PendingPreRequest;
use crate::event::{BrowserPreRequest, RequestDescriptor};
use crate::key::CorrelationKey;
use crate::logger::LookupLogger;
use crate::metrics::{CorrelatorMetrics, MetricsSnapshot};
use crate::store::{PreRequestStore, Take};
use crate::waiter::{Resolver, Waiter};

/// Timing parameters, fixed for the life of a correlator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub request_timeout: Duration,
    pub max_cache_age: Duration,
    pub sweep_interval: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self::from(&CorrelatorConfig::default())
    }
}

impl From<&CorrelatorConfig> for Timings {
    fn from(cfg: &CorrelatorConfig) -> Self {
        Self {
            request_timeout: cfg.request_timeout(),
            max_cache_age: cfg.max_cache_age(),
            sweep_interval: cfg.sweep_interval(),
        }
    }
}

#[derive(Default)]
pub(crate) struct CorrelatorState {
    pub(crate) pre_requests: PreRequestStore,
    pub(crate) waiters: HashMap<CorrelationKey, Waiter>,
}

/// Correlation engine shared between the browser event feed and the proxy.
///
/// Waiter timeouts and the sweeper are spawned on the runtime captured at
/// construction, so lookups may come from any thread. Both maps sit behind one mutex that is never held
/// while a callback runs, so callbacks may call back into the correlator.
pub struct Correlator {
    pub(crate) timings: Timings,
    pub(crate) state: Mutex<CorrelatorState>,
    pub(crate) metrics: CorrelatorMetrics,
    next_waiter_id: AtomicU64,
    pub(crate) shutdown: CancellationToken,
    pub(crate) runtime: Handle,
}

impl Correlator {
    /// Bind to the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime; use
    /// [`Correlator::with_handle`] there.
    pub fn new(timings: Timings) -> Self {
        Self::with_handle(timings, Handle::current())
    }

    pub fn with_handle(timings: Timings, runtime: Handle) -> Self {
        Self {
            timings,
            state: Mutex::new(CorrelatorState::default()),
            metrics: CorrelatorMetrics::default(),
            next_waiter_id: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
            runtime,
        }
    }

    /// Build a shared correlator with its sweeper already running.
    pub fn start(timings: Timings) -> Arc<Self> {
        let correlator = Arc::new(Self::new(timings));
        correlator.start_sweeper();
        correlator
    }

    pub fn timings(&self) -> Timings {
        self.timings
    }

    /// Record a browser pre-request.
    ///
    /// A lookup already waiting on the same key is resolved with `event`
    /// and nothing is cached. Otherwise the event is cached until
    /// `max_cache_age`, replacing any unconsumed event for that key.
    pub fn add_pre_request(&self, event: BrowserPreRequest) {
        self.metrics.record_pre_request();
        let key = CorrelationKey::from_pre_request(&event);

        let mut state = self.lock_state();

        if let Some(waiter) = state.waiters.remove(&key) {
            // `None` means the timeout won the race; fall through and cache.
            if let Some(callback) = waiter.resolver.take() {
                drop(state);
                waiter.cancel_timer();
                trace!(
                    target: "prelink::correlator",
                    key = %key,
                    "Incoming pre-request matches pending lookup"
                );
                waiter
                    .resolver
                    .logger()
                    .log(&format!("Pre-request for {key} arrived while request was waiting"));
                callback(Some(event));
                return;
            }
        }

        trace!(
            target: "prelink::correlator",
            key = %key,
            "Caching pre-request to be matched later"
        );
        let entry = PendingPreRequest::new(event, Instant::now(), self.timings.max_cache_age);
        if state.pre_requests.insert(key.clone(), entry).is_some() {
            drop(state);
            self.metrics.record_unmatched_pre_requests(1);
            debug!(
                target: "prelink::correlator",
                key = %key,
                "Replaced unconsumed pre-request with a newer one"
            );
        }
    }

    /// Look up the pre-request for a proxied request.
    ///
    /// `callback` runs exactly once: before this returns if a cached
    /// pre-request matches, otherwise later with the pre-request that
    /// arrives within `request_timeout`, or with `None`.
    pub fn get_pre_request<D, F>(self: &Arc<Self>, req: &D, logger: Arc<dyn LookupLogger>, callback: F)
    where
        D: RequestDescriptor + ?Sized,
        F: FnOnce(Option<BrowserPreRequest>) + Send + 'static,
    {
        self.metrics.record_lookup();
        let key = CorrelationKey::from_request(req);

        let now = Instant::now();
        let mut state = self.lock_state();

        match state.pre_requests.take(&key, now) {
            Take::Fresh(event) => {
                drop(state);
                self.metrics.record_immediate_match();
                logger.log(&format!("Incoming request {key} matches known pre-request"));
                callback(Some(event));
                return;
            }
            Take::Expired(entry) => {
                self.metrics.record_unmatched_pre_requests(1);
                debug!(
                    target: "prelink::correlator",
                    key = %key,
                    age_ms = now.saturating_duration_since(entry.received_at).as_millis() as u64,
                    "Dropped expired pre-request ahead of sweep"
                );
            }
            Take::Missing => {}
        }

        let id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);
        let resolver = Arc::new(Resolver::new(Box::new(callback), logger));
        let waiter = Waiter::new(id, Arc::clone(&resolver));
        let timer = waiter.timer();

        // The displaced waiter keeps its own timer and resolves empty on it.
        if let Some(displaced) = state.waiters.insert(key.clone(), waiter) {
            debug!(
                target: "prelink::correlator",
                key = %key,
                displaced_id = displaced.id,
                "Lookup replaced an earlier pending lookup for the same key"
            );
        }
        drop(state);

        self.arm_timeout(key, id, resolver, timer);
    }

    /// Async form of [`Correlator::get_pre_request`].
    pub async fn lookup<D>(
        self: &Arc<Self>,
        req: &D,
        logger: Arc<dyn LookupLogger>,
    ) -> Option<BrowserPreRequest>
    where
        D: RequestDescriptor + ?Sized,
    {
        let (tx, rx) = oneshot::channel();
        self.get_pre_request(req, logger, move |pre| {
            let _ = tx.send(pre);
        });
        rx.await.ok().flatten()
    }

    /// Cached pre-requests not yet consumed or evicted.
    pub fn pending_pre_requests(&self) -> usize {
        self.lock_state().pre_requests.len()
    }

    /// Lookups currently parked in the waiter table.
    pub fn pending_waiters(&self) -> usize {
        self.lock_state().waiters.len()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Stop the sweeper, resolve every waiting lookup with `None` and drop
    /// the cache. Returns the final counters for the caller to report.
    pub fn shutdown(&self) -> MetricsSnapshot {
        self.shutdown.cancel();

        let (waiters, stale) = {
            let mut state = self.lock_state();
            let waiters: Vec<Waiter> = state.waiters.drain().map(|(_, w)| w).collect();
            (waiters, state.pre_requests.drain())
        };

        self.metrics.record_unmatched_pre_requests(stale.len() as u64);

        for waiter in waiters {
            waiter.cancel_timer();
            if let Some(callback) = waiter.resolver.take() {
                self.metrics.record_unmatched_lookup();
                waiter
                    .resolver
                    .logger()
                    .log("Correlator shutting down. Continuing without a pre-request.");
                callback(None);
            }
        }

        debug!(
            target: "prelink::correlator",
            dropped_pre_requests = stale.len(),
            "Correlator shut down"
        );

        self.snapshot()
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, CorrelatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn arm_timeout(
        self: &Arc<Self>,
        key: CorrelationKey,
        id: u64,
        resolver: Arc<Resolver>,
        timer: CancellationToken,
    ) {
        let correlator = Arc::clone(self);
        let deadline = Instant::now() + self.timings.request_timeout;

        self.runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = timer.cancelled() => {}
                _ = sleep_until(deadline) => correlator.expire_waiter(&key, id, &resolver),
            }
        });
    }

    fn expire_waiter(&self, key: &CorrelationKey, id: u64, resolver: &Resolver) {
        let Some(callback) = resolver.take() else {
            return;
        };

        {
            let mut state = self.lock_state();
            if state.waiters.get(key).is_some_and(|w| w.id == id) {
                state.waiters.remove(key);
            }
        }

        self.metrics.record_unmatched_lookup();
        resolver.logger().log(&format!(
            "Never received pre-request for request {key}. Continuing without one."
        ));
        callback(None);
    }
}
