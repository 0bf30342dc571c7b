//! # Changefeed command line entry point

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use changefeed::{
    config::ConfigLoader,
    connectors::Registry,
    db,
    sync_executor::{SyncEngine, SyncStatus},
    telemetry,
};

#[derive(Debug, Parser)]
#[command(name = "changefeed", version, about = "Sync change events from connected providers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Sync a single connection
    Sync {
        #[arg(long)]
        connection: Uuid,
    },
    /// Sync every enabled connection
    SyncAll,
    /// List registered providers
    Providers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    telemetry::init_tracing(&config).context("initializing tracing")?;
    tracing::debug!(profile = %config.profile, "Configuration loaded");

    let registry = Arc::new(Registry::from_config(&config).context("building provider registry")?);

    if let Command::Providers = cli.command {
        println!("{}", serde_json::to_string_pretty(&registry.list_metadata())?);
        return Ok(());
    }

    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;

    match cli.command {
        Command::Migrate => {
            db::run_migrations(&db).await?;
            println!("Migrations applied");
        }
        Command::Sync { connection } => {
            let engine = SyncEngine::new(db, registry, &config);
            let report = engine.run_sync(connection).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.status == SyncStatus::Error {
                std::process::exit(1);
            }
        }
        Command::SyncAll => {
            let engine = SyncEngine::new(db, registry, &config);
            let reports = engine.sync_all().await.context("syncing connections")?;
            let output: Vec<_> = reports
                .iter()
                .map(|(connection_id, report)| {
                    serde_json::json!({ "connection_id": connection_id, "report": report })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Providers => {}
    }

    Ok(())
}
