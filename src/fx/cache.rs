use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::Clock;

/// Single-entry read-through cache with a TTL measured against an injected
/// clock.
///
/// The lock is only held for the copy in/out, never across an await point.
pub struct TtlCache<T> {
    entry: Mutex<Option<(DateTime<Utc>, T)>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entry: Mutex::new(None),
            ttl,
            clock,
        }
    }

    /// Returns the cached value if it is still within the TTL.
    pub fn get(&self) -> Option<T> {
        let guard = self.entry.lock().expect("ttl cache lock poisoned");
        let (stored_at, value) = guard.as_ref()?;
        let age = (self.clock.now() - *stored_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if age < self.ttl {
            Some(value.clone())
        } else {
            None
        }
    }

    pub fn put(&self, value: T) {
        let mut guard = self.entry.lock().expect("ttl cache lock poisoned");
        *guard = Some((self.clock.now(), value));
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
