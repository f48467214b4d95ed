//! Response caching for signed notary replies.

pub mod error;
mod lru_backend;
#[cfg(feature = "cache-redis")]
mod redis_backend;

pub use error::CacheError;
pub use lru_backend::LruCache;
#[cfg(feature = "cache-redis")]
pub use redis_backend::RedisCache;

use async_trait::async_trait;
use std::time::Duration;

/// A key-value cache of `service_id -> signed_xml`. `Set` must
/// deduplicate concurrent writes to the same key so a cache miss never
/// triggers more than one in-flight recomputation.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}
