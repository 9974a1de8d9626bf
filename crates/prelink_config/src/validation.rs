use std::path::Path;

use crate::PrelinkConfig;

/// Proxied requests are held while a lookup waits; beyond this the proxy stalls.
const MAX_REQUEST_TIMEOUT_MS: u64 = 60_000;

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Validation output for a loaded Prelink configuration.
#[derive(Debug, Default)]
pub struct ConfigReport {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ConfigReport {
    /// Returns true when no errors were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true when at least one error was found.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the collected warning messages.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Returns the collected error messages.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Render warnings and errors into a readable, multi-line string.
    pub fn format(&self) -> String {
        let mut out = String::new();
        if !self.errors.is_empty() {
            out.push_str("Errors:\n");
            for err in &self.errors {
                out.push_str("  - ");
                out.push_str(err);
                out.push('\n');
            }
        }
        if !self.warnings.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Warnings:\n");
            for warn in &self.warnings {
                out.push_str("  - ");
                out.push_str(warn);
                out.push('\n');
            }
        }
        out
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Validate a Prelink configuration and return a report of issues.
pub fn validate(cfg: &PrelinkConfig) -> ConfigReport {
    let mut report = ConfigReport::default();

    validate_global(cfg, &mut report);
    validate_correlator(cfg, &mut report);
    validate_replay(cfg, &mut report);

    report
}

fn validate_global(cfg: &PrelinkConfig, report: &mut ConfigReport) {
    let level = cfg.global.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        report.warn(format!(
            "global.log_level '{level}' is not a plain level; it will be used as a filter directive"
        ));
    }
}

fn validate_correlator(cfg: &PrelinkConfig, report: &mut ConfigReport) {
    let c = &cfg.correlator;

    if c.request_timeout_ms > MAX_REQUEST_TIMEOUT_MS {
        report.error(format!(
            "correlator.request_timeout_ms {} exceeds {MAX_REQUEST_TIMEOUT_MS}; proxied requests would stall",
            c.request_timeout_ms
        ));
    }

    if c.request_timeout_ms > c.max_cache_age_ms {
        report.warn(format!(
            "correlator.request_timeout_ms {} is longer than max_cache_age_ms {}",
            c.request_timeout_ms, c.max_cache_age_ms
        ));
    }

    if c.sweep_interval_ms > c.max_cache_age_ms {
        report.warn(format!(
            "correlator.sweep_interval_ms {} is longer than max_cache_age_ms {}; stale pre-requests may linger up to {} ms",
            c.sweep_interval_ms,
            c.max_cache_age_ms,
            c.sweep_interval_ms + c.max_cache_age_ms
        ));
    }
}

fn validate_replay(cfg: &PrelinkConfig, report: &mut ConfigReport) {
    let Some(input) = cfg.replay.input() else {
        return;
    };

    if input.trim().is_empty() {
        report.error("replay.input is empty; omit it or use '-' for stdin");
        return;
    }

    let path = Path::new(input);
    if !path.exists() {
        report.error(format!("replay.input '{input}' does not exist"));
    } else if !path.is_file() {
        report.error(format!("replay.input '{input}' is not a file"));
    }
}
