use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use reqsink::config::{Config, DatabaseConfig, Driver};
use reqsink::server::{self, AppState};
use reqsink::store::{Datastore, MemoryStore, PostgresStore, SqliteStore};
use reqsink::{cleanup, BroadcastHub};

#[derive(Debug, Parser)]
#[command(name = "reqsink", about = "Disposable HTTP inspection endpoints", version)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, short, global = true, env = "REQSINK_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve,

    /// Purge captured requests older than the configured TTL
    Purge,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {path}"))?,
        None => Config::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str())),
        )
        .init();

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Purge => purge(config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let store = open_store(&config.http.database).await?;

    let hub = Arc::new(BroadcastHub::with_config(config.hub_config()));
    let cleanup_task = hub.spawn_cleanup_task();

    let state = Arc::new(AppState::new(store, Arc::clone(&hub), config.server_config()));

    server::serve(state).await.context("serving HTTP")?;

    cleanup_task.abort();
    Ok(())
}

async fn purge(config: Config) -> anyhow::Result<()> {
    let store = open_store(&config.http.database).await?;

    let ttl = chrono::Duration::from_std(config.cron.ttl).context("cron.ttl out of range")?;
    let before = Utc::now() - ttl;

    let purged = cleanup::purge(store.as_ref(), before, config.cron.soft_deletes)
        .await
        .context("purging expired requests")?;

    tracing::info!(purged = purged, "Purge complete");
    Ok(())
}

async fn open_store(database: &DatabaseConfig) -> anyhow::Result<Arc<dyn Datastore>> {
    let store: Arc<dyn Datastore> = match database.driver {
        Driver::Postgres => Arc::new(
            PostgresStore::connect(&database.dsn)
                .await
                .context("connecting to postgres")?,
        ),
        Driver::Sqlite => Arc::new(
            SqliteStore::connect(&database.dsn)
                .await
                .context("connecting to sqlite")?,
        ),
        Driver::Memory => {
            tracing::warn!("Using the in-memory store, captures will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    Ok(store)
}
