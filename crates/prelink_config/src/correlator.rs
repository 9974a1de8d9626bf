use std::time::Duration;

use serde::Deserialize;

// =======================================================
// CORRELATOR CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Timing parameters of the pre-request correlator.
///
/// The three values are independent of each other; none is derived
/// from another.
pub struct CorrelatorConfig {
    /// Max wait for a proxied request before it proceeds unmatched.
    pub request_timeout_ms: u64,
    /// Max lifetime of a cached pre-request that was never looked up.
    pub max_cache_age_ms: u64,
    /// Period of the background eviction scan.
    pub sweep_interval_ms: u64,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 500,
            max_cache_age_ms: 10_000,
            sweep_interval_ms: 2_000,
        }
    }
}

impl CorrelatorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn max_cache_age(&self) -> Duration {
        Duration::from_millis(self.max_cache_age_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &CorrelatorConfig) {
        if self.request_timeout_ms == 0 {
            self.request_timeout_ms = defaults.request_timeout_ms;
        }
        if self.max_cache_age_ms == 0 {
            self.max_cache_age_ms = defaults.max_cache_age_ms;
        }
        if self.sweep_interval_ms == 0 {
            self.sweep_interval_ms = defaults.sweep_interval_ms;
        }
    }
}

// =======================================================
// REPLAY CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Settings for the trace replay driver.
pub struct ReplayConfig {
    /// Trace file to replay; `None` or `"-"` reads stdin.
    pub input: Option<String>,
    /// Extra time to wait for in-flight lookups after the trace ends.
    pub drain_grace_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            input: None,
            drain_grace_ms: 1_000,
        }
    }
}

impl ReplayConfig {
    pub fn input(&self) -> Option<&str> {
        self.input.as_deref().filter(|p| *p != "-")
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }
}
