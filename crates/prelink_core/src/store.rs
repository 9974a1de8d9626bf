use std::collections::HashMap;

use tokio::time::Instant;

use crate::entry::PendingPreRequest;
use crate::event::BrowserPreRequest;
use crate::key::CorrelationKey;

/// Result of consuming a cached pre-request.
#[derive(Debug)]
pub(crate) enum Take {
    Fresh(BrowserPreRequest),
    /// Present but past its expiry; already removed.
    Expired(PendingPreRequest),
    Missing,
}

/// Pending pre-request cache: at most one record per key.
///
/// Not synchronized; the correlator guards it together with the waiter table.
#[derive(Debug, Default)]
pub(crate) struct PreRequestStore {
    entries: HashMap<CorrelationKey, PendingPreRequest>,
}

impl PreRequestStore {
    /// Insert, replacing any unconsumed record for the key.
    pub(crate) fn insert(
        &mut self,
        key: CorrelationKey,
        entry: PendingPreRequest,
    ) -> Option<PendingPreRequest> {
        self.entries.insert(key, entry)
    }

    pub(crate) fn take(&mut self, key: &CorrelationKey, now: Instant) -> Take {
        match self.entries.remove(key) {
            Some(entry) if entry.is_expired(now) => Take::Expired(entry),
            Some(entry) => Take::Fresh(entry.event),
            None => Take::Missing,
        }
    }

    /// Remove every record whose expiry has passed.
    pub(crate) fn evict_expired(&mut self, now: Instant) -> Vec<(CorrelationKey, PendingPreRequest)> {
        let expired: Vec<CorrelationKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|key| self.entries.remove(&key).map(|entry| (key, entry)))
            .collect()
    }

    pub(crate) fn drain(&mut self) -> Vec<(CorrelationKey, PendingPreRequest)> {
        self.entries.drain().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
