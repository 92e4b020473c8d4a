//! Page cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TTL_SECONDS: u64 = 20;
const DEFAULT_CAPACITY: usize = 256;
const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PageCacheConfig {
    pub enabled: bool,
    /// Seconds a rendered page is served before it is recomputed.
    pub ttl_seconds: u64,
    /// Maximum number of cached pages; least recently used entries are evicted.
    pub capacity: usize,
    /// Largest response body the cache will buffer.
    pub body_limit_bytes: usize,
}

impl Default for PageCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: DEFAULT_TTL_SECONDS,
            capacity: DEFAULT_CAPACITY,
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
        }
    }
}

impl From<&crate::config::CacheSettings> for PageCacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl_seconds: settings.ttl_seconds,
            capacity: settings.capacity,
            body_limit_bytes: settings.body_limit_bytes,
        }
    }
}

impl PageCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Capacity as `NonZeroUsize`, clamping zero to one entry.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
