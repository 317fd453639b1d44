//! CLI command implementations.

pub mod cache;
pub mod health;
pub mod migrate;
pub mod todo;
