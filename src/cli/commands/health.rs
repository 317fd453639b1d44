//! Health check command.

use anyhow::{bail, Result};
use std::time::Instant;

use crate::adapters::cache::connect_backend;
use crate::adapters::postgres::{create_pool, verify_connection, PoolConfig};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Debug, serde::Serialize)]
pub struct ComponentStatus {
    pub component: String,
    pub healthy: bool,
    pub latency_ms: u128,
    pub error: Option<String>,
}

impl ComponentStatus {
    fn from_result(component: &str, started: Instant, result: Result<()>) -> Self {
        let latency_ms = started.elapsed().as_millis();
        match result {
            Ok(()) => Self {
                component: component.to_string(),
                healthy: true,
                latency_ms,
                error: None,
            },
            Err(err) => Self {
                component: component.to_string(),
                healthy: false,
                latency_ms,
                error: Some(format!("{err:#}")),
            },
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct HealthOutput {
    pub healthy: bool,
    pub components: Vec<ComponentStatus>,
}

impl CommandOutput for HealthOutput {
    fn to_human(&self) -> String {
        let mut lines = Vec::with_capacity(self.components.len() + 1);
        for status in &self.components {
            let line = match &status.error {
                None => format!("  {:<10} ok ({} ms)", status.component, status.latency_ms),
                Some(err) => format!("  {:<10} FAILED: {err}", status.component),
            };
            lines.push(line);
        }
        let summary = if self.healthy { "All components healthy" } else { "Unhealthy" };
        lines.insert(0, summary.to_string());
        lines.join("\n")
    }
}

pub async fn execute(config: &Config, json_mode: bool) -> Result<()> {
    let started = Instant::now();
    let database = check_database(config).await;
    let database = ComponentStatus::from_result("database", started, database);

    let started = Instant::now();
    let cache = check_cache(config).await;
    let cache = ComponentStatus::from_result("cache", started, cache);

    let out = HealthOutput {
        healthy: database.healthy && cache.healthy,
        components: vec![database, cache],
    };
    output(&out, json_mode);

    if !out.healthy {
        bail!("health check failed");
    }
    Ok(())
}

async fn check_database(config: &Config) -> Result<()> {
    let pool = create_pool(&config.database.url, Some(PoolConfig::from(&config.database))).await?;
    verify_connection(&pool).await?;
    pool.close().await;
    Ok(())
}

async fn check_cache(config: &Config) -> Result<()> {
    let backend = connect_backend(&config.cache).await?;
    backend.ping().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_output_marks_failures() {
        let out = HealthOutput {
            healthy: false,
            components: vec![
                ComponentStatus {
                    component: "database".into(),
                    healthy: true,
                    latency_ms: 3,
                    error: None,
                },
                ComponentStatus {
                    component: "cache".into(),
                    healthy: false,
                    latency_ms: 1,
                    error: Some("connection refused".into()),
                },
            ],
        };
        let text = out.to_human();
        assert!(text.starts_with("Unhealthy"));
        assert!(text.contains("database   ok (3 ms)"));
        assert!(text.contains("cache      FAILED: connection refused"));
    }
}
