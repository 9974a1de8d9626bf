//! Lifecycle counters. Observability only; correctness never reads them.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub(crate) struct CorrelatorMetrics {
    pre_requests_received: AtomicU64,
    lookups_received: AtomicU64,
    immediately_matched: AtomicU64,
    unmatched_lookups: AtomicU64,
    unmatched_pre_requests: AtomicU64,
}

impl CorrelatorMetrics {
    pub(crate) fn record_pre_request(&self) {
        self.pre_requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lookup(&self) {
        self.lookups_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_immediate_match(&self) {
        self.immediately_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unmatched_lookup(&self) {
        self.unmatched_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unmatched_pre_requests(&self, n: u64) {
        self.unmatched_pre_requests.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pre_requests_received: self.pre_requests_received.load(Ordering::Relaxed),
            lookups_received: self.lookups_received.load(Ordering::Relaxed),
            immediately_matched: self.immediately_matched.load(Ordering::Relaxed),
            unmatched_lookups: self.unmatched_lookups.load(Ordering::Relaxed),
            unmatched_pre_requests: self.unmatched_pre_requests.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the correlator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Pre-requests reported by the browser.
    pub pre_requests_received: u64,
    /// Lookups made by the proxy.
    pub lookups_received: u64,
    /// Lookups answered from the cache without waiting.
    pub immediately_matched: u64,
    /// Lookups that resolved empty.
    pub unmatched_lookups: u64,
    /// Cached pre-requests dropped without ever being looked up.
    pub unmatched_pre_requests: u64,
}
