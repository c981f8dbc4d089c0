//! Prometheus metrics middleware.
//!
//! Provides HTTP request metrics, ingestion counters and the text exporter.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

use domain::services::BatchSummary;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Middleware to record HTTP request metrics.
///
/// Records the following metrics:
/// - `http_requests_total`: Counter with labels (method, path, status)
/// - `http_request_duration_seconds`: Histogram with labels (method, path)
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = method_to_str(req.method());
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(
        "http_requests_total",
        "method" => method,
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(duration);

    response
}

/// Convert HTTP method to string for metric labels.
fn method_to_str(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::HEAD => "HEAD",
        Method::OPTIONS => "OPTIONS",
        _ => "OTHER",
    }
}

/// Counts webhook calls by envelope type.
pub fn record_webhook_received(payload_type: &str) {
    let label = match payload_type {
        "system.verification" | "device.messages" => payload_type.to_string(),
        _ => "other".to_string(),
    };
    counter!("webhook_requests_total", "type" => label).increment(1);
}

/// Records the outcome counters of one processed batch.
pub fn record_batch_summary(summary: &BatchSummary) {
    counter!("ingest_messages_received_total").increment(summary.received as u64);
    counter!("ingest_records_inserted_total").increment(summary.inserted as u64);
    counter!("ingest_records_duplicate_total").increment(summary.duplicates as u64);
    counter!("ingest_devices_updated_total").increment(summary.devices_updated as u64);
    counter!("ingest_zone_events_total").increment(summary.zone_events as u64);
    counter!("ingest_alerts_sent_total").increment(summary.alerts_sent as u64);
    counter!("ingest_failures_total").increment(summary.failures as u64);

    for (reason, count) in &summary.discard_reasons {
        counter!("ingest_messages_discarded_total", "reason" => *reason).increment(*count as u64);
    }

    histogram!("ingest_batch_size").record(summary.received as f64);
}

/// Handler for /metrics endpoint that returns Prometheus text format.
pub async fn metrics_handler() -> impl IntoResponse {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
    } else {
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            [(axum::http::header::CONTENT_TYPE, "text/plain")],
            "Metrics not initialized".to_string(),
        )
    }
}

/// Installs the global Prometheus recorder. Calling it again is a no-op.
pub fn init_metrics() -> Result<(), BuildError> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(&[0.001, 0.005, 0.01, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0])?
        .install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_to_str() {
        assert_eq!(method_to_str(&Method::GET), "GET");
        assert_eq!(method_to_str(&Method::POST), "POST");
        assert_eq!(method_to_str(&Method::OPTIONS), "OPTIONS");
        assert_eq!(method_to_str(&Method::TRACE), "OTHER");
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        let mut summary = BatchSummary {
            received: 3,
            inserted: 2,
            discarded: 1,
            ..Default::default()
        };
        summary.discard_reasons.insert("unsupported_app_id", 1);

        record_batch_summary(&summary);
        record_webhook_received("device.messages");
        record_webhook_received("something.else");
    }
}
