//! In-process cache backend on moka.
//!
//! Mirrors the Redis primitives closely enough to stand in for it in a single process:
//! per-entry TTLs, atomic set-if-absent, hashes and cursor scans. Scans page through a
//! snapshot taken when the cursor starts, so keys deleted mid-scan never shift later pages.
//! Snapshots of scans nobody resumes are dropped after [`SCAN_CURSOR_IDLE`].

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use regex::Regex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::{CacheBackend, ScanPage};

/// Default maximum number of entries.
pub const DEFAULT_MEMORY_CAPACITY: u64 = 10_000;

/// How long an unfinished scan keeps its snapshot without being resumed.
pub const SCAN_CURSOR_IDLE: Duration = Duration::from_secs(60);

const MAX_OPEN_SCANS: u64 = 1_024;

#[derive(Debug, Clone)]
enum Slot {
    Bytes(Vec<u8>),
    Hash(HashMap<String, Vec<u8>>),
}

#[derive(Debug)]
struct Stored {
    slot: Slot,
    ttl: Option<Duration>,
    /// Overwrites keep the remaining lifetime instead of restarting `ttl` (HSET semantics).
    keep_ttl: bool,
}

struct PerEntryTtl;

impl Expiry<String, Arc<Stored>> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Arc<Stored>, _created_at: Instant) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Arc<Stored>,
        _updated_at: Instant,
        duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        if value.keep_ttl {
            duration_until_expiry
        } else {
            value.ttl
        }
    }
}

pub struct MemoryCache {
    entries: Cache<String, Arc<Stored>>,
    /// Serializes read-modify-write on hashes.
    hash_writes: tokio::sync::Mutex<()>,
    /// Remaining keys of scans that have not reached the end, by cursor.
    scans: Cache<u64, Arc<VecDeque<String>>>,
    next_cursor: AtomicU64,
}

impl MemoryCache {
    pub fn new(max_capacity: u64) -> Self {
        Self::with_scan_cursor_idle(max_capacity, SCAN_CURSOR_IDLE)
    }

    pub fn with_scan_cursor_idle(max_capacity: u64, scan_idle: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PerEntryTtl)
                .build(),
            hash_writes: tokio::sync::Mutex::new(()),
            scans: Cache::builder()
                .max_capacity(MAX_OPEN_SCANS)
                .time_to_idle(scan_idle)
                .build(),
            next_cursor: AtomicU64::new(1),
        }
    }

    /// Number of scans holding a snapshot for a later page.
    pub async fn open_scans(&self) -> u64 {
        self.scans.run_pending_tasks().await;
        self.scans.entry_count()
    }

    fn bytes(value: Vec<u8>, ttl: Option<Duration>) -> Arc<Stored> {
        Arc::new(Stored {
            slot: Slot::Bytes(value),
            ttl,
            keep_ttl: false,
        })
    }

    fn snapshot(&self, pattern: &str) -> CacheResult<VecDeque<String>> {
        let matcher = glob_to_regex(pattern)?;
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .map(|(key, _)| key.to_string())
            .filter(|key| matcher.is_match(key) && self.entries.contains_key(key))
            .collect();
        keys.sort_unstable();
        Ok(keys.into())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        match self.entries.get(key).await {
            None => Ok(None),
            Some(stored) => match &stored.slot {
                Slot::Bytes(bytes) => Ok(Some(bytes.clone())),
                Slot::Hash(_) => Err(CacheError::WrongType(key.to_string())),
            },
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        self.entries.insert(key.to_string(), Self::bytes(value, ttl)).await;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<bool> {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(async { Self::bytes(value, Some(ttl)) })
            .await;
        Ok(entry.is_fresh())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.invalidate(key).await;
        Ok(())
    }

    async fn scan(&self, pattern: &str, cursor: u64, count: usize) -> CacheResult<ScanPage> {
        let mut remaining = if cursor == 0 {
            self.snapshot(pattern)?
        } else {
            match self.scans.remove(&cursor).await {
                Some(remaining) => Arc::unwrap_or_clone(remaining),
                // Finished, expired or never issued.
                None => return Ok(ScanPage::default()),
            }
        };

        let take = count.max(1).min(remaining.len());
        let keys: Vec<String> = remaining.drain(..take).collect();
        if remaining.is_empty() {
            return Ok(ScanPage { cursor: 0, keys });
        }

        let next = self.next_cursor.fetch_add(1, Ordering::Relaxed);
        self.scans.insert(next, Arc::new(remaining)).await;
        Ok(ScanPage { cursor: next, keys })
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<()> {
        for key in keys {
            self.entries.invalidate(key).await;
        }
        Ok(())
    }

    async fn multi_get(&self, keys: &[String]) -> CacheResult<Vec<Option<Vec<u8>>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            // MGET reports keys of other types as missing rather than failing.
            let value = self.entries.get(key).await.and_then(|stored| match &stored.slot {
                Slot::Bytes(bytes) => Some(bytes.clone()),
                Slot::Hash(_) => None,
            });
            values.push(value);
        }
        Ok(values)
    }

    async fn multi_set(&self, entries: Vec<(String, Vec<u8>)>, ttl: Option<Duration>) -> CacheResult<()> {
        for (key, value) in entries {
            self.entries.insert(key, Self::bytes(value, ttl)).await;
        }
        Ok(())
    }

    async fn hash_set(&self, key: &str, field: &str, value: Vec<u8>) -> CacheResult<()> {
        let _write = self.hash_writes.lock().await;
        let (mut fields, ttl, keep_ttl) = match self.entries.get(key).await {
            None => (HashMap::new(), None, false),
            Some(stored) => match &stored.slot {
                Slot::Hash(fields) => (fields.clone(), stored.ttl, true),
                Slot::Bytes(_) => return Err(CacheError::WrongType(key.to_string())),
            },
        };
        fields.insert(field.to_string(), value);
        self.entries
            .insert(
                key.to_string(),
                Arc::new(Stored {
                    slot: Slot::Hash(fields),
                    ttl,
                    keep_ttl,
                }),
            )
            .await;
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> CacheResult<Option<Vec<u8>>> {
        match self.entries.get(key).await {
            None => Ok(None),
            Some(stored) => match &stored.slot {
                Slot::Hash(fields) => Ok(fields.get(field).cloned()),
                Slot::Bytes(_) => Err(CacheError::WrongType(key.to_string())),
            },
        }
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    async fn flush(&self) -> CacheResult<()> {
        self.entries.invalidate_all();
        self.scans.invalidate_all();
        Ok(())
    }
}

/// Translate a Redis-style glob (`*`, `?`) into an anchored regex.
fn glob_to_regex(pattern: &str) -> CacheResult<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| CacheError::backend(format!("invalid key pattern: {pattern}"), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_to_regex() {
        let re = glob_to_regex("todos:list:*").unwrap();
        assert!(re.is_match("todos:list:abc"));
        assert!(!re.is_match("todos:1"));
        assert!(!re.is_match("xtodos:list:abc"));

        let re = glob_to_regex("a?c.d").unwrap();
        assert!(re.is_match("abc.d"));
        assert!(!re.is_match("abcxd"));
    }

    #[tokio::test]
    async fn test_set_if_absent_only_first_wins() {
        let cache = MemoryCache::default();
        assert!(cache.set_if_absent("k", b"1".to_vec(), Duration::from_secs(5)).await.unwrap());
        assert!(!cache.set_if_absent("k", b"2".to_vec(), Duration::from_secs(5)).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let cache = MemoryCache::default();
        cache.set("short", b"v".to_vec(), Some(Duration::from_millis(50))).await.unwrap();
        cache.set("long", b"v".to_vec(), None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.get("short").await.unwrap(), None);
        assert!(cache.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_wrong_type_is_reported() {
        let cache = MemoryCache::default();
        cache.hash_set("h", "f", b"v".to_vec()).await.unwrap();
        assert!(matches!(cache.get("h").await, Err(CacheError::WrongType(_))));
        cache.set("s", b"v".to_vec(), None).await.unwrap();
        assert!(matches!(cache.hash_get("s", "f").await, Err(CacheError::WrongType(_))));
    }

    #[tokio::test]
    async fn test_scan_pages_survive_deletes() {
        let cache = MemoryCache::default();
        for i in 0..25 {
            cache.set(&format!("t:{i:02}"), vec![1], None).await.unwrap();
        }
        cache.set("other", vec![1], None).await.unwrap();

        let mut seen = Vec::new();
        let mut cursor = 0;
        loop {
            let page = cache.scan("t:*", cursor, 10).await.unwrap();
            cache.delete_many(&page.keys).await.unwrap();
            seen.extend(page.keys);
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }
        assert_eq!(seen.len(), 25);
        assert!(cache.get("other").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_abandoned_scan_snapshot_expires() {
        let cache = MemoryCache::with_scan_cursor_idle(100, Duration::from_millis(50));
        for i in 0..10 {
            cache.set(&format!("t:{i}"), vec![1], None).await.unwrap();
        }

        let first = cache.scan("t:*", 0, 3).await.unwrap();
        assert_ne!(first.cursor, 0);
        assert_eq!(cache.open_scans().await, 1);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.open_scans().await, 0);

        let resumed = cache.scan("t:*", first.cursor, 3).await.unwrap();
        assert_eq!(resumed, ScanPage::default());
    }

    #[tokio::test]
    async fn test_finished_scan_leaves_no_snapshot() {
        let cache = MemoryCache::default();
        for i in 0..5 {
            cache.set(&format!("t:{i}"), vec![1], None).await.unwrap();
        }
        let mut cursor = 0;
        loop {
            cursor = cache.scan("t:*", cursor, 2).await.unwrap().cursor;
            if cursor == 0 {
                break;
            }
        }
        assert_eq!(cache.open_scans().await, 0);
    }

    #[tokio::test]
    async fn test_hash_set_keeps_remaining_ttl() {
        let cache = MemoryCache::default();
        let mut fields = HashMap::new();
        fields.insert("a".to_string(), b"1".to_vec());
        cache
            .entries
            .insert(
                "h".to_string(),
                Arc::new(Stored {
                    slot: Slot::Hash(fields),
                    ttl: Some(Duration::from_millis(200)),
                    keep_ttl: false,
                }),
            )
            .await;

        tokio::time::sleep(Duration::from_millis(120)).await;
        cache.hash_set("h", "b", b"2".to_vec()).await.unwrap();
        assert_eq!(cache.hash_get("h", "b").await.unwrap(), Some(b"2".to_vec()));

        tokio::time::sleep(Duration::from_millis(130)).await;
        assert_eq!(cache.hash_get("h", "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_plain_set_restarts_ttl() {
        let cache = MemoryCache::default();
        cache.set("k", b"1".to_vec(), Some(Duration::from_millis(200))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        cache.set("k", b"2".to_vec(), Some(Duration::from_millis(200))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(130)).await;
        assert_eq!(cache.get("k").await.unwrap(), Some(b"2".to_vec()));
    }
}
