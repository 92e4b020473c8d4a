//! TTL + LRU storage for rendered pages.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use metrics::counter;

use super::config::PageCacheConfig;
use super::keys::PageCacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// A rendered response captured for replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

struct Entry {
    response: CachedResponse,
    expires_at: Instant,
}

/// Process-local page cache shared by the public router and the admin listener.
pub struct PageCache {
    ttl: Duration,
    entries: RwLock<LruCache<PageCacheKey, Entry>>,
}

impl PageCache {
    pub fn new(config: &PageCacheConfig) -> Self {
        Self {
            ttl: config.ttl(),
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &PageCacheKey) -> Option<CachedResponse> {
        self.get_at(key, Instant::now())
    }

    /// Look up `key` as of `now`, dropping the entry if it has expired.
    pub fn get_at(&self, key: &PageCacheKey, now: Instant) -> Option<CachedResponse> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let fresh = match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.response.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        };

        if fresh.is_some() {
            counter!("yatube_page_cache_hit_total").increment(1);
        } else {
            counter!("yatube_page_cache_miss_total").increment(1);
        }
        fresh
    }

    pub fn insert(&self, key: PageCacheKey, response: CachedResponse) {
        self.insert_at(key, response, Instant::now());
    }

    /// Store `response` so it stays fresh for one TTL from `now`. An existing
    /// entry for the same key is overwritten.
    pub fn insert_at(&self, key: PageCacheKey, response: CachedResponse, now: Instant) {
        let entry = Entry {
            response,
            expires_at: now + self.ttl,
        };
        let evicted = rw_write(&self.entries, SOURCE, "insert").push(key.clone(), entry);
        counter!("yatube_page_cache_store_total").increment(1);
        if evicted.is_some_and(|(evicted_key, _)| evicted_key != key) {
            counter!("yatube_page_cache_evict_total").increment(1);
        }
    }

    /// Drop every entry immediately.
    pub fn clear(&self) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        let removed = entries.len();
        entries.clear();
        counter!("yatube_page_cache_clear_total").increment(1);
        removed
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
