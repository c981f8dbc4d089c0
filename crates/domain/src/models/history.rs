//! Telemetry history query models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::telemetry::{MessageType, Reading, TelemetryRecord};

/// Raw history query parameters as received from a caller.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    #[serde(default, rename = "type")]
    pub message_type: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[validate(range(min = 1, max = 1000, message = "limit must be between 1 and 1000"))]
    #[serde(default)]
    pub limit: Option<u32>,
}

/// One history row. Fields irrelevant to the message type are `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(with = "shared::time::iso8601_millis")]
    pub timestamp: DateTime<Utc>,
    pub message_type: MessageType,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub accuracy: Option<f64>,
    pub temperature: Option<f64>,
}

impl From<&TelemetryRecord> for HistoryEntry {
    fn from(record: &TelemetryRecord) -> Self {
        let (lat, lon, accuracy, temperature) = match &record.reading {
            Reading::Gnss { lat, lon, accuracy } | Reading::GroundFix { lat, lon, accuracy, .. } => {
                (Some(*lat), Some(*lon), *accuracy, None)
            }
            Reading::Temp { temperature } => (None, None, None, Some(*temperature)),
        };

        Self {
            timestamp: record.timestamp,
            message_type: record.message_type(),
            lat,
            lon,
            accuracy,
            temperature,
        }
    }
}
