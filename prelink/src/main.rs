mod replay;

use std::sync::Arc;

use prelink_config::PrelinkConfig;
use prelink_core::{Correlator, Timings};
use tracing::{info, warn};
use utils::init_tracing;

const CONFIG_FILE: &str = "prelink.conf";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cfg = PrelinkConfig::from_file_or_default(CONFIG_FILE);
    if let Some(input) = std::env::args().nth(1) {
        cfg.replay.input = Some(input);
    }

    init_tracing(cfg.global().log_level());
    cfg.print();

    let timings = Timings::from(cfg.correlator());
    let correlator = Correlator::start(timings);
    info!(
        target: "prelink::main",
        request_timeout_ms = timings.request_timeout.as_millis() as u64,
        max_cache_age_ms = timings.max_cache_age.as_millis() as u64,
        sweep_interval_ms = timings.sweep_interval.as_millis() as u64,
        "Correlator started"
    );

    let reader = replay::open_input(cfg.replay()).await?;

    let outcome = tokio::select! {
        res = replay::replay(reader, Arc::clone(&correlator), cfg.replay()) => Some(res),
        _ = tokio::signal::ctrl_c() => {
            warn!(target: "prelink::main", "Interrupted, shutting down");
            None
        }
    };

    let metrics = correlator.shutdown();
    info!(
        target: "prelink::main",
        metrics = %serde_json::to_string(&metrics).unwrap_or_default(),
        "Correlator metrics"
    );

    if let Some(res) = outcome {
        let summary = res?;
        info!(
            target: "prelink::main",
            pre_requests = summary.pre_requests,
            lookups = summary.lookups,
            matched = summary.matched,
            unmatched = summary.unmatched,
            skipped_lines = summary.skipped_lines,
            "Replay finished"
        );
    }

    Ok(())
}
