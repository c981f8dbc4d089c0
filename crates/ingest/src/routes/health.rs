//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::app::AppState;
use crate::config::StorageBackend;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
    /// Absent with the in-memory backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseHealth>,
}

/// Database health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseHealth {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// Simple status response for liveness/readiness probes.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

async fn database_health(state: &AppState) -> Option<DatabaseHealth> {
    let pool = state.pool.as_ref()?;
    let start = std::time::Instant::now();
    let connected = persistence::db::ping(pool).await.is_ok();
    Some(DatabaseHealth {
        connected,
        latency_ms: connected.then(|| start.elapsed().as_millis() as u64),
    })
}

/// Full health check endpoint.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let database = database_health(&state).await;
    let healthy = database.as_ref().map_or(true, |db| db.connected);

    let backend = match state.config.ingest.backend {
        StorageBackend::Postgres => "postgres",
        StorageBackend::Memory => "memory",
    };

    if !healthy {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: backend.to_string(),
        database,
    }))
}

/// Liveness probe endpoint.
///
/// Returns 200 OK if the process is running.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 OK once the store can take writes.
pub async fn ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    match database_health(&state).await {
        Some(db) if !db.connected => Err(StatusCode::SERVICE_UNAVAILABLE),
        _ => Ok(Json(StatusResponse {
            status: "ready".to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_without_database() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.3.0".to_string(),
            backend: "memory".to_string(),
            database: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["backend"], "memory");
        assert!(json.get("database").is_none());
    }

    #[test]
    fn test_health_response_with_database() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.3.0".to_string(),
            backend: "postgres".to_string(),
            database: Some(DatabaseHealth {
                connected: true,
                latency_ms: Some(3),
            }),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["database"]["connected"], true);
        assert_eq!(json["database"]["latency_ms"], 3);
    }

    #[test]
    fn test_status_response() {
        let json = serde_json::to_string(&StatusResponse {
            status: "alive".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"alive"}"#);
    }
}
