//! `schedulerd run`: start a scheduler against the configured SQLite
//! store and local event broker, and block until `SIGINT`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::adapters::broker::LocalEventBroker;
use crate::adapters::sqlite::{initialize_database, SqliteDataStore};
use crate::core::{Scheduler, SchedulerOptions};
use crate::domain::models::Identity;
use crate::domain::ports::{DataStore, EventBroker};
use crate::infrastructure::config::Config;

pub async fn handle_run(config: &Config) -> Result<()> {
    let pool = initialize_database(&config.database_url)
        .await
        .context("failed to initialize the SQLite data store")?;
    let store: Arc<dyn DataStore> = Arc::new(SqliteDataStore::new(pool));
    let broker: Arc<dyn EventBroker> = Arc::new(LocalEventBroker::new());

    let options = SchedulerOptions {
        identity: config.identity.clone().map(Identity::new).unwrap_or_else(Identity::generate),
        claim_lease: chrono::Duration::seconds(config.claim_lease_seconds),
        batch_size: config.acquire_batch_size,
        start_worker: config.start_worker,
        stopped_publish_timeout: Duration::from_millis(config.stopped_publish_timeout_ms),
    };

    tracing::info!(identity = %options.identity, database_url = %config.database_url, "starting scheduler");
    let scheduler = Scheduler::start(store, broker, options)
        .await
        .context("failed to start scheduler")?;

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("received interrupt, shutting down");

    scheduler.stop().await.context("failed to signal shutdown")?;
    scheduler.wait_until_stopped().await.context("failed waiting for scheduler to stop")?;
    tracing::info!("scheduler stopped");
    Ok(())
}
