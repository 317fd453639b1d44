//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - RelationalStore: parameterized statements and transactions
//! - CacheBackend: key-value cache primitives
//! - Repository: per-entity CRUD contract
//!
//! These traits define the contracts that allow the domain to be independent
//! of specific infrastructure implementations.

pub mod cache_backend;
pub mod relational_store;
pub mod repository;

pub use cache_backend::{CacheBackend, ScanPage};
pub use relational_store::{QueryOutput, RelationalStore};
pub use repository::Repository;
