//! Redis cache backend.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::info;

use crate::domain::errors::CacheResult;
use crate::domain::ports::{CacheBackend, ScanPage};

/// Redis-backed cache. Cloning shares the underlying multiplexed connection.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("conn", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCache {
    /// Connect to `url` (`redis://` or `rediss://` for TLS). Reconnects are automatic.
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to Redis");
        Ok(Self { conn })
    }
}

/// PX expiry; sub-millisecond TTLs round up to one millisecond.
fn expiry_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn set_command(key: &str, value: Vec<u8>, ttl: Option<Duration>) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);
    if let Some(ttl) = ttl {
        cmd.arg("PX").arg(expiry_millis(ttl));
    }
    cmd
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let value: Option<Vec<u8>> = self.conn.clone().get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let _: () = set_command(key, value, ttl)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<bool> {
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(expiry_millis(ttl))
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let _: () = self.conn.clone().del(key).await?;
        Ok(())
    }

    async fn scan(&self, pattern: &str, cursor: u64, count: usize) -> CacheResult<ScanPage> {
        let (cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(ScanPage { cursor, keys })
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.del(key).ignore();
        }
        let _: () = pipe.query_async(&mut self.conn.clone()).await?;
        Ok(())
    }

    async fn multi_get(&self, keys: &[String]) -> CacheResult<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(values)
    }

    async fn multi_set(&self, entries: Vec<(String, Vec<u8>)>, ttl: Option<Duration>) -> CacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            pipe.add_command(set_command(&key, value, ttl)).ignore();
        }
        let _: () = pipe.query_async(&mut self.conn.clone()).await?;
        Ok(())
    }

    async fn hash_set(&self, key: &str, field: &str, value: Vec<u8>) -> CacheResult<()> {
        let _: () = self.conn.clone().hset(key, field, value).await?;
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> CacheResult<Option<Vec<u8>>> {
        let value: Option<Vec<u8>> = self.conn.clone().hget(key, field).await?;
        Ok(value)
    }

    async fn ping(&self) -> CacheResult<()> {
        let _: String = redis::cmd("PING").query_async(&mut self.conn.clone()).await?;
        Ok(())
    }

    async fn flush(&self) -> CacheResult<()> {
        let _: () = redis::cmd("FLUSHALL").query_async(&mut self.conn.clone()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_rounding() {
        assert_eq!(expiry_millis(Duration::from_micros(10)), 1);
        assert_eq!(expiry_millis(Duration::from_millis(5000)), 5000);
    }

    #[test]
    fn test_set_keeps_fractional_seconds() {
        let packed = set_command("k", b"v".to_vec(), Some(Duration::from_millis(1900)))
            .get_packed_command();
        let text = String::from_utf8_lossy(&packed);
        assert!(text.contains("PX"), "{text}");
        assert!(text.contains("1900"), "{text}");
        assert!(!text.contains("EX\r\n"), "{text}");
    }

    #[test]
    fn test_set_without_ttl_has_no_expiry() {
        let packed = set_command("k", b"v".to_vec(), None).get_packed_command();
        assert!(!String::from_utf8_lossy(&packed).contains("PX"));
    }
}
