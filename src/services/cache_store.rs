//! Typed cache access over a [`CacheBackend`].
//!
//! Every value passes through the codec on the way in and out. Pattern deletion runs as
//! a background task that walks the key space one scan page at a time.

use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::errors::CacheResult;
use crate::domain::ports::CacheBackend;
use crate::services::codec;

/// Keys requested per scan page during pattern deletion.
pub const DEFAULT_SCAN_BATCH_SIZE: usize = 100;

/// Join key parts with `:`, e.g. `["todos", "42"]` -> `todos:42`.
pub fn cache_key<I, P>(parts: I) -> String
where
    I: IntoIterator<Item = P>,
    P: AsRef<str>,
{
    let mut key = String::new();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            key.push(':');
        }
        key.push_str(part.as_ref());
    }
    key
}

#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    scan_batch_size: usize,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
        }
    }

    pub fn with_scan_batch_size(mut self, size: usize) -> Self {
        self.scan_batch_size = size.max(1);
        self
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.backend.get(key).await? {
            Some(bytes) => Ok(Some(codec::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Store `value`; `ttl` of `None` keeps the entry until evicted or deleted.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()>
    where
        T: Serialize + ?Sized + Sync,
    {
        let bytes = encode(key, value)?;
        self.backend.set(key, bytes, ttl).await
    }

    /// Set only when the key is absent. Returns whether this call created it.
    pub async fn set_if_absent<T>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<bool>
    where
        T: Serialize + ?Sized + Sync,
    {
        let bytes = encode(key, value)?;
        self.backend.set_if_absent(key, bytes, ttl).await
    }

    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        self.backend.delete(key).await
    }

    /// Lazily page through keys matching `pattern`. The stream ends after the final page
    /// or the first scan error.
    pub fn scan_keys(&self, pattern: &str) -> impl Stream<Item = CacheResult<Vec<String>>> + Send {
        let backend = Arc::clone(&self.backend);
        let pattern = pattern.to_string();
        let count = self.scan_batch_size;

        stream::unfold(Some(0_u64), move |cursor| {
            let backend = Arc::clone(&backend);
            let pattern = pattern.clone();
            async move {
                let cursor = cursor?;
                match backend.scan(&pattern, cursor, count).await {
                    Ok(page) => {
                        let next = (page.cursor != 0).then_some(page.cursor);
                        Some((Ok(page.keys), next))
                    }
                    Err(err) => Some((Err(err), None)),
                }
            }
        })
    }

    /// Delete every key matching `pattern` in the background.
    ///
    /// Failures are logged, never raised. The handle resolves to the number of keys
    /// deleted; dropping it leaves the task running.
    pub fn delete_by_pattern(&self, pattern: &str) -> JoinHandle<u64> {
        let store = self.clone();
        let pattern = pattern.to_string();
        tokio::spawn(async move { store.delete_matching(&pattern).await })
    }

    /// Awaited form of [`delete_by_pattern`](Self::delete_by_pattern).
    pub async fn delete_matching(&self, pattern: &str) -> u64 {
        let mut pages = Box::pin(self.scan_keys(pattern));
        let mut deleted = 0_u64;

        while let Some(page) = pages.next().await {
            let keys = match page {
                Ok(keys) => keys,
                Err(err) => {
                    warn!(pattern, error = %err, "Key scan failed; stopping pattern delete");
                    break;
                }
            };
            if keys.is_empty() {
                continue;
            }
            match self.backend.delete_many(&keys).await {
                Ok(()) => deleted += keys.len() as u64,
                Err(err) => {
                    warn!(pattern, batch = keys.len(), error = %err, "Failed to delete key batch");
                }
            }
        }

        debug!(pattern, deleted, "Pattern delete finished");
        deleted
    }

    /// Values aligned with `keys`. Entries that fail to decode come back as `None`.
    pub async fn multi_get<T: DeserializeOwned>(&self, keys: &[String]) -> CacheResult<Vec<Option<T>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let raw = self.backend.multi_get(keys).await?;
        Ok(keys
            .iter()
            .zip(raw)
            .map(|(key, bytes)| {
                bytes.and_then(|bytes| match codec::deserialize(&bytes) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        warn!(key = %key, error = %err, "Undecodable cache entry treated as miss");
                        None
                    }
                })
            })
            .collect())
    }

    pub async fn multi_set<T>(&self, entries: &[(String, T)], ttl: Option<Duration>) -> CacheResult<()>
    where
        T: Serialize + Sync,
    {
        if entries.is_empty() {
            return Ok(());
        }
        let encoded = entries
            .iter()
            .map(|(key, value)| Ok((key.clone(), encode(key, value)?)))
            .collect::<CacheResult<Vec<_>>>()?;
        self.backend.multi_set(encoded, ttl).await
    }

    pub async fn hash_set<T>(&self, key: &str, field: &str, value: &T) -> CacheResult<()>
    where
        T: Serialize + ?Sized + Sync,
    {
        let bytes = encode(key, value)?;
        self.backend.hash_set(key, field, bytes).await
    }

    pub async fn hash_get<T: DeserializeOwned>(&self, key: &str, field: &str) -> CacheResult<Option<T>> {
        match self.backend.hash_get(key, field).await? {
            Some(bytes) => Ok(Some(codec::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn health_check(&self) -> CacheResult<()> {
        self.backend.ping().await
    }

    /// Remove every key in the cache, not just this application's.
    pub async fn flush(&self) -> CacheResult<()> {
        self.backend.flush().await?;
        info!("Cache flushed");
        Ok(())
    }
}

fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> CacheResult<Vec<u8>> {
    let encoded = codec::serialize(value)?;
    if let Some(reason) = &encoded.fallback_reason {
        warn!(key, reason = %reason, "MessagePack encoding failed; stored as JSON");
    }
    Ok(encoded.bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_joins_with_colons() {
        assert_eq!(cache_key(["todos", "42"]), "todos:42");
        assert_eq!(cache_key(vec!["todos".to_string(), "list".into(), "ab".into()]), "todos:list:ab");
        assert_eq!(cache_key(["single"]), "single");
        assert_eq!(cache_key(Vec::<String>::new()), "");
    }
}
