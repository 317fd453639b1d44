//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::cache::CacheArgs;
use super::commands::todo::TodoArgs;

#[derive(Parser, Debug)]
#[command(name = "rowcache")]
#[command(about = "Cache-aside data access over PostgreSQL and Redis", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Config file to load instead of rowcache.yaml
    #[arg(short, long, global = true, env = "ROWCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check connectivity to the database and the cache
    Health,

    /// Apply pending schema migrations
    Migrate,

    /// Manage todos through the cached repository
    Todo(TodoArgs),

    /// Inspect and invalidate cache entries
    Cache(CacheArgs),
}
