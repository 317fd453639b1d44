//! Configuration loading
//!
//! Layered with figment: defaults, `rowcache.yaml`, `rowcache.local.yaml`,
//! then `ROWCACHE_*` environment variables. Loaded values are validated before use.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
