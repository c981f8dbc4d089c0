//! Device message webhook.
//!
//! The cloud message router posts an envelope `{type, messages}`. A
//! `system.verification` call only needs the team-id header echoed back;
//! `device.messages` carries the batch to ingest.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use shared::crypto::sha256_hex;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::{record_batch_summary, record_webhook_received};
use crate::middleware::RequestId;

pub const TEAM_ID_HEADER: &str = "x-nrfcloud-team-id";

const SYSTEM_VERIFICATION: &str = "system.verification";
const DEVICE_MESSAGES: &str = "device.messages";

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages_processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devices_updated: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
}

impl WebhookResponse {
    fn ok() -> Self {
        Self {
            message: "OK",
            messages_processed: None,
            devices_updated: None,
            skipped: None,
        }
    }

    fn skipped() -> Self {
        Self {
            skipped: Some(true),
            ..Self::ok()
        }
    }
}

/// `POST /webhooks/device-messages`
pub async fn receive(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> Response {
    let mut response = match dispatch(&state, &request_id, &body).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => e.into_response(),
    };

    if let Ok(value) = HeaderValue::from_str(&state.config.webhook.team_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(TEAM_ID_HEADER), value);
    }

    response
}

async fn dispatch(
    state: &AppState,
    request_id: &RequestId,
    body: &[u8],
) -> Result<WebhookResponse, ApiError> {
    let payload: Value = serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "Failed to parse webhook body");
        ApiError::invalid_json(e)
    })?;

    let payload_type = payload.get("type").and_then(Value::as_str).unwrap_or_default();
    record_webhook_received(payload_type);

    match payload_type {
        SYSTEM_VERIFICATION => {
            info!("Handling system verification request");
            Ok(WebhookResponse::ok())
        }
        DEVICE_MESSAGES => {
            let digest = sha256_hex(&String::from_utf8_lossy(body));
            process_device_messages(state, request_id, &payload, &digest).await
        }
        other => {
            warn!(payload_type = other, "Unknown payload type");
            Ok(WebhookResponse::skipped())
        }
    }
}

async fn process_device_messages(
    state: &AppState,
    request_id: &RequestId,
    payload: &Value,
    digest: &str,
) -> Result<WebhookResponse, ApiError> {
    let messages = match payload.get("messages") {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(messages)) => messages.as_slice(),
        Some(_) => return Err(ApiError::Validation("messages must be an array".into())),
    };

    let max = state.config.ingest.max_batch_size;
    if messages.len() > max {
        warn!(count = messages.len(), max, "Rejecting oversized batch");
        return Err(ApiError::PayloadTooLarge(format!(
            "batch of {} messages exceeds the limit of {}",
            messages.len(),
            max
        )));
    }

    info!(
        request_id = %request_id.0,
        batch_digest = %digest,
        count = messages.len(),
        "Processing device messages"
    );

    let summary = state.pipeline.process_batch(messages, Utc::now()).await;
    record_batch_summary(&summary);

    Ok(WebhookResponse {
        messages_processed: Some(summary.processed),
        devices_updated: Some(summary.devices_updated),
        ..WebhookResponse::ok()
    })
}
