//! In-memory cache with TTL support.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Cache entry with timestamp
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

/// Keyed cache whose entries expire after a fixed time-to-live.
pub struct TtlCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Create a cache from a TTL in seconds
    pub fn with_ttl_secs(secs: u64) -> Self {
        Self::new(Duration::seconds(secs as i64))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get cached data if still valid
    pub fn get(&self, key: &str) -> Option<T> {
        self.get_at(key, Utc::now())
    }

    /// Get cached data as seen at `now`, evicting it if expired
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => now - entry.cached_at > self.ttl,
        };

        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.data.clone())
    }

    /// Set cache data
    pub fn insert(&self, key: &str, data: T) {
        self.insert_at(key, data, Utc::now());
    }

    pub fn insert_at(&self, key: &str, data: T, cached_at: DateTime<Utc>) {
        self.lock()
            .insert(key.to_string(), CacheEntry { data, cached_at });
    }

    /// Clear all entries
    #[allow(dead_code)]
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}
