//! Per-lookup logging capability supplied by the proxy.

use tracing::{debug, Span};

/// Diagnostic sink for one proxied request. Never used for control flow.
pub trait LookupLogger: Send + Sync {
    fn log(&self, message: &str);
}

impl<F> LookupLogger for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

/// Emits debug events inside the proxied request's span.
#[derive(Debug, Clone)]
pub struct SpanLogger {
    span: Span,
}

impl SpanLogger {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    pub fn current() -> Self {
        Self::new(Span::current())
    }
}

impl LookupLogger for SpanLogger {
    fn log(&self, message: &str) {
        self.span
            .in_scope(|| debug!(target: "prelink::lookup", "{message}"));
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl LookupLogger for NoopLogger {
    fn log(&self, _message: &str) {}
}
