use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};

use domain::repository::memory::InMemoryStore;
use domain::repository::{DeviceStateStore, SafeZoneStore, TelemetryLog};
use domain::services::{GeofenceEvaluator, IngestPipeline, NotificationSink};
use persistence::repositories::{
    DeviceStateRepository, SafeZoneRepository, TelemetryLogRepository,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{health, webhook};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestPipeline>,
    pub config: Arc<Config>,
    /// Present only with the PostgreSQL backend.
    pub pool: Option<PgPool>,
}

/// The three stores the pipeline writes through.
pub struct Stores {
    pub log: Arc<dyn TelemetryLog>,
    pub states: Arc<dyn DeviceStateStore>,
    pub zones: Arc<dyn SafeZoneStore>,
}

impl Stores {
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            log: Arc::new(TelemetryLogRepository::new(pool.clone())),
            states: Arc::new(DeviceStateRepository::new(pool.clone())),
            zones: Arc::new(SafeZoneRepository::new(pool.clone())),
        }
    }

    pub fn memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            log: store.clone(),
            states: store.clone(),
            zones: store,
        }
    }
}

/// Wires the stores and sink into a pipeline tuned by `[ingest]` and `[geofence]`.
pub fn build_pipeline(
    config: &Config,
    stores: Stores,
    notifier: Arc<dyn NotificationSink>,
) -> IngestPipeline {
    IngestPipeline::new(stores.log, stores.states, stores.zones, notifier)
        .with_evaluator(GeofenceEvaluator::new(config.geofence.hysteresis_ratio))
        .with_store_timeout(config.ingest.store_timeout())
}

pub fn create_app(config: Config, pipeline: Arc<IngestPipeline>, pool: Option<PgPool>) -> Router {
    let config = Arc::new(config);

    let state = AppState {
        pipeline,
        config: config.clone(),
        pool,
    };

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    let webhook_routes = Router::new()
        .route("/webhooks/device-messages", post(webhook::receive))
        .layer(DefaultBodyLimit::max(config.server.max_body_size));

    Router::new()
        .merge(public_routes)
        .merge(webhook_routes)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .with_state(state)
}
