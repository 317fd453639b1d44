//! rowcache - cache-aside data access over PostgreSQL and Redis
//!
//! A generic statement builder paired with repositories that read through and write
//! through a key-value cache, with a distributed lock against cache stampedes.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and the port traits
//! - **Service Layer** (`services`): query building, codec, cache store, repositories
//! - **Adapters** (`adapters`): PostgreSQL and cache backends implementing the ports
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use rowcache::adapters::cache::MemoryCache;
//! use rowcache::domain::models::{todo_schema, Filter, Page, Todo};
//! use rowcache::services::{CacheStore, CachedRepository};
//!
//! let cache = CacheStore::new(Arc::new(MemoryCache::default()));
//! let todos: CachedRepository<Todo> = CachedRepository::new(store, cache, todo_schema());
//! let page = todos.find_all(&Filter::new().ilike("task_name", "ship"), Page::default()).await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{CacheError, CacheResult, DataError, DataResult};
pub use domain::models::{
    Condition, Config, Entity, FieldSet, Filter, Page, SqlValue, Statement, TableSchema,
};
pub use domain::ports::{CacheBackend, RelationalStore, Repository};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{CacheStore, CachedRepository, QueryBuilder, RecordService, StampedeGuard};
