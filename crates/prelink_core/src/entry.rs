use tokio::time::{Duration, Instant};

use crate::event::BrowserPreRequest;

/// A pre-request waiting for its proxied request.
#[derive(Clone, Debug)]
pub struct PendingPreRequest {
    pub event: BrowserPreRequest,
    pub received_at: Instant,
    pub expires_at: Instant,
}

impl PendingPreRequest {
    pub fn new(event: BrowserPreRequest, received_at: Instant, max_age: Duration) -> Self {
        Self {
            event,
            received_at,
            expires_at: received_at + max_age,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}
