//! Key-value cache port.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::CacheResult;

/// One page of a cursor-based key scan. A returned cursor of `0` ends the scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub cursor: u64,
    pub keys: Vec<String>,
}

/// Byte-level primitives an external cache must provide.
///
/// Payloads are opaque here; encoding happens in the cache store.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store a value, with an expiry when `ttl` is set.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()>;

    /// Create the key only if it does not exist, expiring after `ttl` (millisecond precision).
    /// Returns whether the key was created.
    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<bool>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Return keys matching a glob `pattern`, starting at `cursor`. Order is unspecified.
    async fn scan(&self, pattern: &str, cursor: u64, count: usize) -> CacheResult<ScanPage>;

    /// Delete several keys in one round trip.
    async fn delete_many(&self, keys: &[String]) -> CacheResult<()>;

    /// Values aligned with `keys`; missing keys are `None`.
    async fn multi_get(&self, keys: &[String]) -> CacheResult<Vec<Option<Vec<u8>>>>;

    async fn multi_set(
        &self,
        entries: Vec<(String, Vec<u8>)>,
        ttl: Option<Duration>,
    ) -> CacheResult<()>;

    async fn hash_set(&self, key: &str, field: &str, value: Vec<u8>) -> CacheResult<()>;

    async fn hash_get(&self, key: &str, field: &str) -> CacheResult<Option<Vec<u8>>>;

    async fn ping(&self) -> CacheResult<()>;

    /// Remove every key.
    async fn flush(&self) -> CacheResult<()>;
}
