pub mod cache_store;
pub mod cached_repository;
pub mod codec;
pub mod query_builder;
pub mod record_service;
pub mod stampede;

pub use cache_store::{cache_key, CacheStore};
pub use cached_repository::CachedRepository;
pub use query_builder::{QueryBuilder, SelectQuery};
pub use record_service::RecordService;
pub use stampede::StampedeGuard;
