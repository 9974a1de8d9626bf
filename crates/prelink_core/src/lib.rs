pub mod correlator;
pub mod entry;
pub mod event;
pub mod key;
pub mod logger;
pub mod metrics;
mod store;
mod sweeper;
mod waiter;

pub use correlator::{Correlator, Timings};
pub use event::{BrowserPreRequest, ProxiedRequest, RequestDescriptor};
pub use key::CorrelationKey;
pub use logger::{LookupLogger, NoopLogger, SpanLogger};
pub use metrics::MetricsSnapshot;
pub use waiter::LookupCallback;
