//! Notification service for zone alerts.
//!
//! Provides the payload sent to subscribers when a device enters or leaves
//! a safe zone, and the sink abstraction that delivers it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::models::{EventLocation, ZoneEvent, ZoneTransition};

/// Title and body shown to the subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertText {
    pub title: String,
    pub body: String,
}

/// Notification payload for a zone transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneAlert {
    pub device_id: String,
    pub event_type: ZoneTransition,
    pub zone_id: String,
    pub zone_name: String,
    pub location: EventLocation,
    #[serde(with = "shared::time::iso8601_millis")]
    pub detected_at: DateTime<Utc>,
    pub alert: AlertText,
    /// Set on exits so clients can raise their badge count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge_increment: Option<u32>,
}

impl From<&ZoneEvent> for ZoneAlert {
    fn from(event: &ZoneEvent) -> Self {
        let (alert, badge_increment) = match event.event_type {
            ZoneTransition::Exit => (
                AlertText {
                    title: "Safe zone exit".to_string(),
                    body: format!("Device {} left {}", event.device_id, event.zone_name),
                },
                Some(1),
            ),
            ZoneTransition::Enter => (
                AlertText {
                    title: "Safe zone entry".to_string(),
                    body: format!("Device {} arrived at {}", event.device_id, event.zone_name),
                },
                None,
            ),
        };

        Self {
            device_id: event.device_id.clone(),
            event_type: event.event_type,
            zone_id: event.zone_id.clone(),
            zone_name: event.zone_name.clone(),
            location: event.location.clone(),
            detected_at: event.detected_at,
            alert,
            badge_increment,
        }
    }
}

/// Result of a notification send attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationResult {
    /// Notification was sent successfully.
    Sent,
    /// Notification was skipped (no channel configured).
    Skipped,
    /// Notification sending failed (but was non-blocking).
    Failed(String),
}

/// Sink for zone alerts. Implementations never return a hard error.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, alert: &ZoneAlert) -> NotificationResult;
}

/// Sink used when no notification channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotificationSink;

#[async_trait::async_trait]
impl NotificationSink for DisabledNotificationSink {
    async fn publish(&self, alert: &ZoneAlert) -> NotificationResult {
        tracing::warn!(
            device_id = %alert.device_id,
            zone_id = %alert.zone_id,
            event_type = alert.event_type.as_str(),
            "No notification channel configured, skipping zone alert"
        );
        NotificationResult::Skipped
    }
}

/// Mock notification sink for development and testing.
///
/// Records alerts instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct MockNotificationSink {
    /// Whether to simulate failures for testing.
    pub simulate_failure: bool,
    sent: Arc<Mutex<Vec<ZoneAlert>>>,
}

impl MockNotificationSink {
    /// Create a new mock sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock sink that simulates failures.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// Alerts published so far.
    pub async fn sent(&self) -> Vec<ZoneAlert> {
        self.sent.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl NotificationSink for MockNotificationSink {
    async fn publish(&self, alert: &ZoneAlert) -> NotificationResult {
        if self.simulate_failure {
            tracing::warn!(
                device_id = %alert.device_id,
                zone_id = %alert.zone_id,
                "Mock notification sink simulating failure"
            );
            return NotificationResult::Failed("Simulated failure".to_string());
        }

        tracing::info!(
            device_id = %alert.device_id,
            zone_id = %alert.zone_id,
            event_type = alert.event_type.as_str(),
            "Mock: Would publish zone alert"
        );
        self.sent.lock().await.push(alert.clone());

        NotificationResult::Sent
    }
}
