//! HTTP delivery of zone alerts.
//!
//! Alerts are posted as JSON to a single topic endpoint. Subscribers filter
//! on the `X-Device-Id` header; the body is signed with HMAC-SHA256 when a
//! signing secret is configured.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use domain::services::{DisabledNotificationSink, NotificationResult, NotificationSink, ZoneAlert};
use shared::crypto::{sign_payload, SigningError};

use crate::config::NotificationsConfig;

pub const DEVICE_ID_HEADER: &str = "X-Device-Id";
pub const EVENT_TYPE_HEADER: &str = "X-Event-Type";
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Errors that can occur while building or sending a push request.
#[derive(Error, Debug)]
pub enum PushError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Topic endpoint returned status {0}")]
    Status(u16),
}

/// Notification sink that posts alerts to an HTTP topic endpoint.
pub struct HttpPushSink {
    client: Client,
    topic_url: String,
    signing_secret: Option<String>,
}

impl HttpPushSink {
    pub fn new(
        topic_url: impl Into<String>,
        signing_secret: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PushError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            topic_url: topic_url.into(),
            signing_secret: signing_secret.filter(|s| !s.is_empty()),
        })
    }

    fn build_request(&self, alert: &ZoneAlert) -> Result<reqwest::Request, PushError> {
        let body = serde_json::to_string(alert)?;

        let mut request = self
            .client
            .post(&self.topic_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(DEVICE_ID_HEADER, &alert.device_id)
            .header(EVENT_TYPE_HEADER, alert.event_type.as_str());

        if let Some(secret) = &self.signing_secret {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, &body)?);
        }

        Ok(request.body(body).build()?)
    }

    async fn send(&self, alert: &ZoneAlert) -> Result<(), PushError> {
        let request = self.build_request(alert)?;
        let response = self.client.execute(request).await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(PushError::Status(status.as_u16()))
        }
    }
}

#[async_trait]
impl NotificationSink for HttpPushSink {
    async fn publish(&self, alert: &ZoneAlert) -> NotificationResult {
        match self.send(alert).await {
            Ok(()) => {
                debug!(
                    device_id = %alert.device_id,
                    zone_id = %alert.zone_id,
                    event_type = alert.event_type.as_str(),
                    "Zone alert published"
                );
                NotificationResult::Sent
            }
            Err(e) => {
                warn!(
                    device_id = %alert.device_id,
                    zone_id = %alert.zone_id,
                    error = %e,
                    "Failed to publish zone alert"
                );
                NotificationResult::Failed(e.to_string())
            }
        }
    }
}

/// Builds the sink described by `[notifications]`. Without an enabled
/// topic the pipeline gets a sink that only logs.
pub fn notification_sink(
    config: &NotificationsConfig,
) -> Result<Arc<dyn NotificationSink>, PushError> {
    if !config.enabled || config.topic_url.is_empty() {
        return Ok(Arc::new(DisabledNotificationSink));
    }

    let sink = HttpPushSink::new(
        config.topic_url.clone(),
        Some(config.signing_secret.clone()),
        Duration::from_millis(config.timeout_ms),
    )?;
    Ok(Arc::new(sink))
}
