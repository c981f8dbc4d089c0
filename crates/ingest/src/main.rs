use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use domain::repository::memory::InMemoryStore;
use fleet_ingest::app::{build_pipeline, create_app, Stores};
use fleet_ingest::config::{Config, StorageBackend};
use fleet_ingest::jobs::{JobScheduler, PoolMetricsJob, PurgeExpiredMessagesJob};
use fleet_ingest::middleware::{init_metrics, logging::init_logging};
use fleet_ingest::services::notification_sink;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    init_logging(&config.logging).context("install tracing subscriber")?;
    init_metrics().context("install Prometheus recorder")?;

    info!("Starting fleet ingest v{}", env!("CARGO_PKG_VERSION"));

    let mut scheduler = JobScheduler::new();

    let (stores, pool) = match config.ingest.backend {
        StorageBackend::Postgres => {
            let pool = persistence::db::create_pool(&config.database.pool_config()).await?;

            info!("Running database migrations...");
            sqlx::migrate!("../persistence/src/migrations")
                .run(&pool)
                .await?;
            info!("Migrations completed");

            scheduler.register(PoolMetricsJob::new(pool.clone()));

            (Stores::postgres(&pool), Some(pool))
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on restart");
            (Stores::memory(Arc::new(InMemoryStore::new())), None)
        }
    };

    scheduler.register(PurgeExpiredMessagesJob::new(
        stores.log.clone(),
        config.retention.purge_batch_size,
        config.retention.purge_interval_minutes,
    ));

    let notifier = notification_sink(&config.notifications)?;
    let pipeline = Arc::new(build_pipeline(&config, stores, notifier));

    scheduler.start();

    let addr = config.socket_addr()?;
    let app = create_app(config, pipeline, pool);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(10)).await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
