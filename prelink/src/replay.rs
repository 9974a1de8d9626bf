//! Drives a correlator from a recorded NDJSON trace.
//!
//! Each line is one record, replayed at `at_ms` after the start:
//!
//! ```text
//! {"kind":"pre_request","at_ms":0,"event":{"method":"GET","url":"http://x/a","resourceType":"xhr"}}
//! {"kind":"lookup","at_ms":12,"method":"GET","url":"http://x/a"}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use std::sync::Arc;

use prelink_config::ReplayConfig;
use prelink_core::{BrowserPreRequest, Correlator, ProxiedRequest, SpanLogger};
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tokio::time::{Duration, Instant, sleep_until, timeout};
use tracing::{Instrument, debug, info, info_span, warn};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceRecord {
    PreRequest {
        #[serde(default)]
        at_ms: u64,
        event: BrowserPreRequest,
    },
    Lookup {
        #[serde(default)]
        at_ms: u64,
        method: String,
        url: String,
    },
}

impl TraceRecord {
    pub fn at_ms(&self) -> u64 {
        match self {
            TraceRecord::PreRequest { at_ms, .. } | TraceRecord::Lookup { at_ms, .. } => *at_ms,
        }
    }
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("line {line}: invalid trace record: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub pre_requests: usize,
    pub lookups: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub skipped_lines: usize,
}

pub fn parse_line(line_no: usize, line: &str) -> Result<Option<TraceRecord>, TraceError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|source| TraceError::Parse {
            line: line_no,
            source,
        })
}

/// Open the configured trace file, or stdin.
pub async fn open_input(cfg: &ReplayConfig) -> anyhow::Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match cfg.input() {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            info!(target: "prelink::replay", input = %path, "Replaying trace file");
            Ok(Box::new(BufReader::new(file)))
        }
        None => {
            info!(target: "prelink::replay", "Replaying trace from stdin");
            Ok(Box::new(BufReader::new(tokio::io::stdin())))
        }
    }
}

pub async fn replay<R>(
    reader: R,
    correlator: Arc<Correlator>,
    cfg: &ReplayConfig,
) -> anyhow::Result<ReplaySummary>
where
    R: AsyncBufRead + Unpin,
{
    let start = Instant::now();
    let mut lines = reader.lines();
    let mut lookups = JoinSet::new();
    let mut summary = ReplaySummary::default();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let record = match parse_line(line_no, &line) {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(e) => {
                warn!(target: "prelink::replay", error = %e, "Skipping trace line");
                summary.skipped_lines += 1;
                continue;
            }
        };

        sleep_until(start + Duration::from_millis(record.at_ms())).await;

        match record {
            TraceRecord::PreRequest { event, .. } => {
                summary.pre_requests += 1;
                correlator.add_pre_request(event);
            }
            TraceRecord::Lookup { method, url, .. } => {
                summary.lookups += 1;
                let correlator = Arc::clone(&correlator);
                let span = info_span!("proxied_request", method = %method, url = %url);

                lookups.spawn(
                    async move {
                        let req = ProxiedRequest::new(method, url);
                        let logger = Arc::new(SpanLogger::current());
                        let outcome = correlator.lookup(&req, logger).await;
                        match &outcome {
                            Some(pre) => info!(
                                target: "prelink::replay",
                                request_id = pre.request_id().unwrap_or("-"),
                                resource_type = pre.resource_type().unwrap_or("-"),
                                "Matched browser pre-request"
                            ),
                            None => info!(
                                target: "prelink::replay",
                                "Proceeding without browser pre-request"
                            ),
                        }
                        outcome.is_some()
                    }
                    .instrument(span),
                );
            }
        }
    }

    debug!(
        target: "prelink::replay",
        lines = line_no,
        in_flight = lookups.len(),
        "Trace exhausted, draining lookups"
    );

    let drain = correlator.timings().request_timeout + cfg.drain_grace();
    let drained = timeout(drain, async {
        while let Some(res) = lookups.join_next().await {
            match res {
                Ok(true) => summary.matched += 1,
                Ok(false) => summary.unmatched += 1,
                Err(e) => warn!(target: "prelink::replay", error = %e, "Lookup task failed"),
            }
        }
    })
    .await;

    if drained.is_err() {
        warn!(
            target: "prelink::replay",
            pending = lookups.len(),
            "Gave up waiting for in-flight lookups"
        );
        lookups.abort_all();
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use prelink_config::ReplayConfig;
    use prelink_core::{Correlator, Timings};

    use super::{TraceError, TraceRecord, parse_line, replay};

    #[test]
    fn parses_both_record_kinds() {
        let pre = parse_line(
            1,
            r#"{"kind":"pre_request","at_ms":5,"event":{"method":"GET","url":"http://x/a","resourceType":"img"}}"#,
        )
        .unwrap()
        .unwrap();
        match pre {
            TraceRecord::PreRequest { at_ms, event } => {
                assert_eq!(at_ms, 5);
                assert_eq!(event.resource_type(), Some("img"));
            }
            other => panic!("unexpected record {other:?}"),
        }

        let lookup = parse_line(2, r#"{"kind":"lookup","method":"POST","url":"http://x/c"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(lookup.at_ms(), 0);
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        assert!(parse_line(1, "   ").unwrap().is_none());
        assert!(parse_line(2, "# warmup").unwrap().is_none());
    }

    #[test]
    fn reports_line_number_on_bad_record() {
        let err = parse_line(7, r#"{"kind":"bogus"}"#).unwrap_err();
        let TraceError::Parse { line, .. } = &err;
        assert_eq!(*line, 7);
        assert!(err.to_string().starts_with("line 7:"));
    }

    #[tokio::test(start_paused = true)]
    async fn replays_trace_in_time_order() {
        let trace = r#"
{"kind":"pre_request","at_ms":0,"event":{"method":"GET","url":"http://x/a"}}
{"kind":"lookup","at_ms":10,"method":"GET","url":"http://x/a"}
{"kind":"lookup","at_ms":20,"method":"GET","url":"http://x/b"}
{"kind":"pre_request","at_ms":100,"event":{"method":"GET","url":"http://x/b"}}
not json
{"kind":"lookup","at_ms":200,"method":"GET","url":"http://x/c"}
"#;
        let correlator = Arc::new(Correlator::new(Timings::default()));
        let summary = replay(trace.as_bytes(), Arc::clone(&correlator), &ReplayConfig::default())
            .await
            .expect("replay");

        assert_eq!(summary.pre_requests, 2);
        assert_eq!(summary.lookups, 3);
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.unmatched, 1);
        assert_eq!(summary.skipped_lines, 1);

        let snap = correlator.snapshot();
        assert_eq!(snap.immediately_matched, 1);
        assert_eq!(snap.unmatched_lookups, 1);
        assert_eq!(correlator.pending_waiters(), 0);
    }
}
