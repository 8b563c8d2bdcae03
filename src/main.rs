//! CLI entry point for the OAI-PMH harvester.

use anyhow::{Context, Result};
use clap::Parser;
use harvester_core::{Database, HarvesterConfig, SearchQuery};
use tracing::{debug, info};

mod cli;
mod commands;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = HarvesterConfig::load(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;

    let db_path = args.database.clone().unwrap_or_else(|| config.database_path.clone());
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db = Database::new(&db_path)
        .await
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    info!(database = %db_path.display(), sources = config.sources.len(), "harvester ready");

    let outcome = match args.command {
        Command::Harvest {
            sources,
            all,
            incremental,
        } => commands::run_harvest_command(&config, &db, &sources, all, incremental).await,
        Command::Search {
            query,
            limit,
            record_type,
            repository,
            year_from,
            year_to,
        } => {
            let query = SearchQuery {
                text: Some(query),
                record_type,
                repository,
                year_from,
                year_to,
                page: 1,
                page_size: limit,
            };
            commands::run_search_command(&db, query).await
        }
        Command::Stats => commands::run_stats_command(&db).await,
        Command::State => commands::run_state_command(&config, &db).await,
    };

    db.close().await;
    outcome
}
