//! Domain layer for rowcache
//!
//! This module contains the data model, errors and port traits.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{CacheError, CacheResult, DataError, DataResult};
