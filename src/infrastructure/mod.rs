//! Infrastructure layer module
//!
//! Configuration loading and logging setup shared by the CLI.

pub mod config;
pub mod logging;
