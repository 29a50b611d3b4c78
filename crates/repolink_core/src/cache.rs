//! Auth token cache owned by a coordinator instance.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;

struct Entry {
    token: String,
    fetched_at: DateTime<Utc>,
}

/// Single-slot TTL cache for the backend bearer token.
///
/// Each coordinator owns one; nothing is shared process-wide, so tests get a
/// fresh cache with every coordinator.
pub struct TokenCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entry: Mutex<Option<Entry>>,
}

impl TokenCache {
    /// Create an empty cache. A non-positive `ttl` disables caching.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entry: Mutex::new(None),
        }
    }

    /// The cached token, if younger than the TTL.
    pub fn get(&self) -> Option<String> {
        let entry = self.entry.lock().ok()?;
        let entry = entry.as_ref()?;
        let age = self.clock.now().signed_duration_since(entry.fetched_at);
        (age < self.ttl).then(|| entry.token.clone())
    }

    /// Cache `token` as of now.
    pub fn put(&self, token: &str) {
        if self.ttl <= Duration::zero() {
            return;
        }
        if let Ok(mut entry) = self.entry.lock() {
            *entry = Some(Entry {
                token: token.to_string(),
                fetched_at: self.clock.now(),
            });
        }
    }

    /// Drop the cached token.
    pub fn invalidate(&self) {
        if let Ok(mut entry) = self.entry.lock() {
            *entry = None;
        }
    }
}
