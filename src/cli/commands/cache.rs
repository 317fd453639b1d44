//! Cache maintenance commands.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::filter::validate_identifier;
use crate::services::cache_key;

#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Drop every cached entry of a table
    Invalidate {
        /// Table name
        table: String,
    },
    /// Show a cached value as JSON
    Get {
        /// Full cache key, e.g. todos:<id>
        key: String,
    },
    /// Remove every key from the cache
    Flush {
        /// Confirm flushing the whole cache
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct InvalidateOutput {
    pub pattern: String,
    pub deleted: u64,
}

impl CommandOutput for InvalidateOutput {
    fn to_human(&self) -> String {
        format!("Deleted {} key(s) matching {}", self.deleted, self.pattern)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct CacheValueOutput {
    pub key: String,
    pub value: Option<serde_json::Value>,
}

impl CommandOutput for CacheValueOutput {
    fn to_human(&self) -> String {
        match &self.value {
            None => format!("{}: (miss)", self.key),
            Some(value) => format!(
                "{}:\n{}",
                self.key,
                serde_json::to_string_pretty(value).unwrap_or_default()
            ),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct FlushOutput {
    pub success: bool,
}

impl CommandOutput for FlushOutput {
    fn to_human(&self) -> String {
        "Cache flushed.".to_string()
    }
}

pub async fn execute(args: CacheArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    match args.command {
        CacheCommands::Invalidate { table } => {
            validate_identifier(&table)?;
            let pattern = cache_key([table.as_str(), "*"]);
            let deleted = ctx.cache.delete_matching(&pattern).await;
            output(&InvalidateOutput { pattern, deleted }, json_mode);
        }

        CacheCommands::Get { key } => {
            let value = ctx
                .cache
                .get::<serde_json::Value>(&key)
                .await
                .with_context(|| format!("Failed to read cache key {key}"))?;
            output(&CacheValueOutput { key, value }, json_mode);
        }

        CacheCommands::Flush { yes } => {
            if !yes {
                bail!("refusing to flush the cache without --yes");
            }
            ctx.cache.flush().await.context("Failed to flush the cache")?;
            output(&FlushOutput { success: true }, json_mode);
        }
    }

    Ok(())
}
