//! Connections shared by the CLI commands.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::adapters::cache::connect_backend;
use crate::adapters::postgres::{create_pool, PgStore, PoolConfig};
use crate::domain::models::{todo_schema, Config, Todo, TODOS_TABLE};
use crate::domain::ports::RelationalStore;
use crate::services::{CacheStore, CachedRepository, RecordService, StampedeGuard};

pub type TodoService = RecordService<CachedRepository<Todo>>;

pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn RelationalStore>,
    pub cache: CacheStore,
}

impl AppContext {
    /// Open the database pool and the configured cache backend.
    pub async fn connect(config: Config) -> Result<Self> {
        let pool = create_pool(&config.database.url, Some(PoolConfig::from(&config.database)))
            .await
            .context("Failed to connect to the database")?;
        let backend = connect_backend(&config.cache)
            .await
            .context("Failed to connect to the cache")?;

        Ok(Self {
            store: Arc::new(PgStore::new(pool)),
            cache: CacheStore::new(backend).with_scan_batch_size(config.cache.scan_batch_size),
            config,
        })
    }

    /// Assemble from already-built parts.
    pub fn from_parts(config: Config, store: Arc<dyn RelationalStore>, cache: CacheStore) -> Self {
        Self { config, store, cache }
    }

    pub fn todo_repository(&self) -> CachedRepository<Todo> {
        let cache_config = &self.config.cache;
        let schema = todo_schema()
            .with_entry_ttl(cache_config.default_ttl())
            .with_lock_guard(cache_config.lock_timeout());
        let guard = StampedeGuard::new(self.cache.clone())
            .with_retry_interval(cache_config.lock_retry_interval());

        CachedRepository::new(Arc::clone(&self.store), self.cache.clone(), schema)
            .with_stampede_guard(guard)
    }

    pub fn todo_service(&self) -> TodoService {
        RecordService::new(Arc::new(self.todo_repository()), TODOS_TABLE)
    }
}
