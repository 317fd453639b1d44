//! Cache backends: Redis for shared deployments, moka for a single process.

pub mod memory_cache;
pub mod redis_cache;

pub use memory_cache::MemoryCache;
pub use redis_cache::RedisCache;

use std::sync::Arc;

use crate::domain::errors::CacheResult;
use crate::domain::models::{CacheBackendKind, CacheConfig};
use crate::domain::ports::CacheBackend;

/// Build the backend selected by `config`.
pub async fn connect_backend(config: &CacheConfig) -> CacheResult<Arc<dyn CacheBackend>> {
    match config.backend {
        CacheBackendKind::Redis => Ok(Arc::new(RedisCache::connect(&config.url).await?)),
        CacheBackendKind::Memory => Ok(Arc::new(MemoryCache::new(config.memory_capacity))),
    }
}
