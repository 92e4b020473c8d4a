//! Whole-page response cache for the home listing.
//!
//! Entries live for a fixed TTL and are never invalidated by writes; new
//! posts appear once the entry expires or the cache is cleared through the
//! admin listener. Expiry is checked lazily when an entry is read.
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 20
//! capacity = 256
//! ```

mod config;
mod keys;
mod lock;
mod middleware;
mod store;

pub use config::PageCacheConfig;
pub use keys::PageCacheKey;
pub use middleware::{PageCacheState, page_cache_layer};
pub use store::{CachedResponse, PageCache};
