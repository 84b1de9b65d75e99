//! Gallerist maintenance CLI.
//!
//! - Apply database migrations
//! - Sweep orphaned blobs
//! - Print the public image listing

use clap::{Parser, Subcommand};
use gallerist::{
    FileSystemBlobStore, GalleristConfig, MediaIngestionService, PgPool, PostgresMediaRepository,
    establish_pool, init_tracing, run_migrations,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Gallerist - media ingestion and grouping maintenance
#[derive(Parser, Debug)]
#[command(name = "gallerist")]
#[command(about = "Media ingestion and grouping maintenance", long_about = None)]
#[command(version)]
struct Cli {
    /// Command to execute
    #[command(subcommand)]
    command: Commands,

    /// Configuration file layered over the bundled defaults
    #[arg(long, global = true, env = "GALLERIST_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Delete blobs that no media record references
    Reconcile {
        /// Only consider blobs older than this many seconds
        #[arg(long, default_value = "3600")]
        grace_secs: u64,
    },

    /// Print public images as JSON
    Images {
        /// Maximum number of images to list
        #[arg(long)]
        limit: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    let config = match &cli.config {
        Some(path) => GalleristConfig::from_file(path)?,
        None => GalleristConfig::load()?,
    };

    let database_url = config.database.resolve_url()?;
    let pool = establish_pool(&database_url, config.database.max_connections)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    match cli.command {
        Commands::Migrate => {
            let applied = tokio::task::spawn_blocking(move || run_migrations(&pool)).await??;
            if applied.is_empty() {
                println!("Database is up to date");
            }
            for version in applied {
                println!("Applied {}", version);
            }
        }

        Commands::Reconcile { grace_secs } => {
            let service = build_service(&config, pool)?;
            let report = service
                .reconcile_orphans(Duration::from_secs(grace_secs), &cancel)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Images { limit } => {
            let service = build_service(&config, pool)?;
            let page = service.get_all_images(limit, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
    }

    Ok(())
}

type Service = MediaIngestionService<FileSystemBlobStore, PostgresMediaRepository>;

fn build_service(
    config: &GalleristConfig,
    pool: PgPool,
) -> Result<Service, Box<dyn std::error::Error>> {
    let store = FileSystemBlobStore::new(
        &config.storage.base_dir,
        config.storage.base_url.clone(),
    )?;
    let repository = PostgresMediaRepository::new(pool);
    Ok(MediaIngestionService::new(
        Arc::new(store),
        Arc::new(repository),
        config.cache.clone(),
    ))
}
