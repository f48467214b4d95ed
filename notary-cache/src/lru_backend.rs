//! Byte-bounded in-process LRU cache.

use crate::error::CacheError;
use crate::Cache;
use async_trait::async_trait;
use lru::LruCache as LruMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn size(&self) -> usize {
        self.value.len()
    }
}

struct Inner {
    entries: LruMap<String, Entry>,
    current_bytes: usize,
    max_bytes: usize,
}

/// Byte-bounded (not entry-bounded) LRU cache. Entries larger than
/// `max_bytes` are silently rejected; setting a key evicts
/// least-recently-used entries until the incoming entry fits.
pub struct LruCache {
    inner: Mutex<Inner>,
    /// One `Notify` per key currently being written, so concurrent `set`
    /// calls for the same key serialize instead of racing (thundering-herd
    /// protection).
    in_flight: Mutex<HashMap<String, Arc<Notify>>>,
}

impl LruCache {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                // Capacity is an upper bound on entry count purely to size
                // the underlying map; the real bound enforced is bytes.
                entries: LruMap::new(NonZeroUsize::new(usize::MAX).unwrap()),
                current_bytes: 0,
                max_bytes,
            }),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn evict_expired_and_get(inner: &mut Inner, key: &str) -> Option<String> {
        if let Some(entry) = inner.entries.peek(key) {
            if entry.expires_at <= Instant::now() {
                if let Some(stale) = inner.entries.pop(key) {
                    inner.current_bytes -= stale.size();
                }
                return None;
            }
        }
        inner.entries.get(key).map(|e| e.value.clone())
    }

    fn insert(inner: &mut Inner, key: String, value: String, ttl: Duration) {
        let size = value.len();
        if size > inner.max_bytes {
            tracing::debug!(key, size, max_bytes = inner.max_bytes, "cache set rejected: entry exceeds capacity");
            return;
        }

        if let Some(old) = inner.entries.pop(&key) {
            inner.current_bytes -= old.size();
        }

        while inner.current_bytes + size > inner.max_bytes {
            match inner.entries.pop_lru() {
                Some((_, evicted)) => inner.current_bytes -= evicted.size(),
                None => break,
            }
        }

        inner.current_bytes += size;
        inner.entries.put(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

#[async_trait]
impl Cache for LruCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut inner = self.inner.lock();
        Ok(Self::evict_expired_and_get(&mut inner, key))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        // Wait for any write already in flight for this key, then claim
        // the slot ourselves so a third concurrent writer queues behind us.
        loop {
            let notify = {
                let mut in_flight = self.in_flight.lock();
                if let Some(existing) = in_flight.get(key) {
                    Some(existing.clone())
                } else {
                    in_flight.insert(key.to_string(), Arc::new(Notify::new()));
                    None
                }
            };

            match notify {
                Some(existing) => existing.notified().await,
                None => break,
            }
        }

        {
            let mut inner = self.inner.lock();
            Self::insert(&mut inner, key.to_string(), value, ttl);
        }

        if let Some(notify) = self.in_flight.lock().remove(key) {
            notify.notify_waiters();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = LruCache::new(1024);
        cache
            .set("a", "hello".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("a").await.unwrap(), Some("hello".to_string()));
    }

    #[tokio::test]
    async fn entries_larger_than_max_bytes_are_rejected() {
        let cache = LruCache::new(4);
        cache
            .set("a", "way too long".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn eviction_removes_least_recently_used_entry() {
        let cache = LruCache::new(10);
        cache
            .set("a", "12345".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("b", "67890".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        // touch "a" so "b" becomes the LRU entry
        cache.get("a").await.unwrap();
        cache
            .set("c", "abcde".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get("b").await.unwrap(), None);
        assert_eq!(cache.get("a").await.unwrap(), Some("12345".to_string()));
        assert_eq!(cache.get("c").await.unwrap(), Some("abcde".to_string()));
    }

    #[tokio::test]
    async fn expired_entries_are_invisible_to_get() {
        let cache = LruCache::new(1024);
        cache
            .set("a", "hello".to_string(), Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("a").await.unwrap(), None);
    }
}
