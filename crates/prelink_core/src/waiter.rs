use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::event::BrowserPreRequest;
use crate::logger::LookupLogger;

/// Single-use result callback of a lookup.
pub type LookupCallback = Box<dyn FnOnce(Option<BrowserPreRequest>) + Send + 'static>;

/// Owns a lookup's callback until exactly one resolver takes it.
///
/// Shared by the waiter table entry and the waiter's timeout task; whichever
/// side calls `take` first wins, every later `take` gets `None`.
pub(crate) struct Resolver {
    callback: Mutex<Option<LookupCallback>>,
    logger: Arc<dyn LookupLogger>,
}

impl Resolver {
    pub(crate) fn new(callback: LookupCallback, logger: Arc<dyn LookupLogger>) -> Self {
        Self {
            callback: Mutex::new(Some(callback)),
            logger,
        }
    }

    pub(crate) fn take(&self) -> Option<LookupCallback> {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub(crate) fn logger(&self) -> &dyn LookupLogger {
        self.logger.as_ref()
    }
}

/// A lookup parked until its pre-request arrives or its timer fires.
pub(crate) struct Waiter {
    pub(crate) id: u64,
    pub(crate) resolver: Arc<Resolver>,
    timer: CancellationToken,
}

impl Waiter {
    pub(crate) fn new(id: u64, resolver: Arc<Resolver>) -> Self {
        Self {
            id,
            resolver,
            timer: CancellationToken::new(),
        }
    }

    /// Handle the timeout task watches.
    pub(crate) fn timer(&self) -> CancellationToken {
        self.timer.clone()
    }

    /// Idempotent; a fired or already-canceled timer is left alone.
    pub(crate) fn cancel_timer(&self) {
        self.timer.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::{Resolver, Waiter};
    use crate::logger::NoopLogger;

    #[test]
    fn callback_is_taken_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let resolver = Resolver::new(
            Box::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
            Arc::new(NoopLogger),
        );

        let first = resolver.take();
        assert!(first.is_some());
        assert!(resolver.take().is_none());

        if let Some(cb) = first {
            cb(None);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_timer_is_idempotent() {
        let resolver = Arc::new(Resolver::new(Box::new(|_| {}), Arc::new(NoopLogger)));
        let waiter = Waiter::new(1, resolver);
        let timer = waiter.timer();

        waiter.cancel_timer();
        waiter.cancel_timer();
        assert!(timer.is_cancelled());
    }
}
