use std::str::FromStr;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Default filter built from the configured level.
///
/// At plain `info` our own crates are raised to debug. Any other level,
/// quieter or louder, applies to every target as given, and non-level
/// directives pass through untouched.
fn default_directives(log_level: &str) -> String {
    let level = log_level.trim();
    let level = if level.is_empty() { "info" } else { level };

    match LevelFilter::from_str(level) {
        Ok(LevelFilter::INFO) => format!("{level},prelink=debug,prelink_core=debug"),
        _ => level.to_string(),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(true)
                .with_thread_ids(false),
        )
        .init();
}
