//! rowcache CLI entry point.

use anyhow::Result;
use clap::Parser;

use rowcache::cli::commands::{cache, health, migrate, todo};
use rowcache::cli::{AppContext, Cli, Commands};
use rowcache::infrastructure::config::ConfigLoader;
use rowcache::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli.command, cli.config, cli.json).await {
        rowcache::cli::handle_error(err, cli.json);
    }
}

async fn run(command: Commands, config_path: Option<std::path::PathBuf>, json: bool) -> Result<()> {
    let config = match config_path {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let _logger = LoggerImpl::init(&config.logging)?;

    match command {
        Commands::Health => health::execute(&config, json).await,
        Commands::Migrate => migrate::execute(&config, json).await,
        Commands::Todo(args) => {
            let ctx = AppContext::connect(config).await?;
            todo::execute(args, &ctx, json).await
        }
        Commands::Cache(args) => {
            let ctx = AppContext::connect(config).await?;
            cache::execute(args, &ctx, json).await
        }
    }
}
