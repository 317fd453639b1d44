//! Schema migration command.

use anyhow::{Context, Result};

use crate::adapters::postgres::{all_embedded_migrations, create_pool, Migrator, PoolConfig};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Debug, serde::Serialize)]
pub struct MigrateOutput {
    pub applied: usize,
    pub version: i64,
}

impl CommandOutput for MigrateOutput {
    fn to_human(&self) -> String {
        if self.applied == 0 {
            format!("Schema is up to date (version {}).", self.version)
        } else {
            format!(
                "Applied {} migration(s); schema is at version {}.",
                self.applied, self.version
            )
        }
    }
}

pub async fn execute(config: &Config, json_mode: bool) -> Result<()> {
    let pool = create_pool(&config.database.url, Some(PoolConfig::from(&config.database)))
        .await
        .context("Failed to connect to the database")?;
    let migrator = Migrator::new(pool.clone());

    let applied = migrator
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .context("Failed to apply migrations")?;
    let version = migrator.get_current_version().await?;
    pool.close().await;

    output(&MigrateOutput { applied, version }, json_mode);
    Ok(())
}
