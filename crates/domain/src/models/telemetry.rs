//! Telemetry domain models.
//!
//! A [`RawMessage`] is one entry of a vendor batch as it arrives on the wire.
//! A [`TelemetryRecord`] is the canonical, immutable form written to the
//! message log, keyed by `(device_id, timestamp)`.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

use super::device_state::{Location, LocationSource, Temperature};

/// One raw device message from an ingestion batch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub received_at: Option<String>,
    #[serde(default)]
    pub message: Option<RawPayload>,
}

/// The vendor message envelope inside a [`RawMessage`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPayload {
    #[serde(default)]
    pub app_id: Option<String>,
    /// Device clock, epoch milliseconds.
    #[serde(default, deserialize_with = "epoch_millis")]
    pub ts: Option<i64>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RawPayload {
    /// True when the envelope carries nothing at all (`"message": {}`).
    pub fn is_empty(&self) -> bool {
        self.app_id.is_none() && self.ts.is_none() && self.data.is_null()
    }
}

/// Accepts any JSON number; fractional milliseconds are truncated.
fn epoch_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Some(ms) = number.as_i64() {
        return Ok(Some(ms));
    }

    match number.as_f64() {
        Some(ms) if ms.is_finite() && ms.abs() < i64::MAX as f64 => Ok(Some(ms.trunc() as i64)),
        _ => Err(de::Error::custom(format!(
            "device timestamp {number} is out of range"
        ))),
    }
}

/// Application id of a raw message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppId {
    Gnss,
    GroundFix,
    Temp,
    Unsupported(String),
}

impl AppId {
    /// Parses a vendor `appId`. Unknown values are kept for logging.
    pub fn parse(s: &str) -> Self {
        match s {
            "GNSS" => AppId::Gnss,
            "GROUND_FIX" => AppId::GroundFix,
            "TEMP" => AppId::Temp,
            other => AppId::Unsupported(other.to_string()),
        }
    }
}

/// Message types accepted into the message log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "GNSS")]
    Gnss,
    #[serde(rename = "GROUND_FIX")]
    GroundFix,
    #[serde(rename = "TEMP")]
    Temp,
}

impl MessageType {
    /// Converts to the stored string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Gnss => "GNSS",
            MessageType::GroundFix => "GROUND_FIX",
            MessageType::Temp => "TEMP",
        }
    }

    /// Parses the stored string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GNSS" => Some(MessageType::Gnss),
            "GROUND_FIX" => Some(MessageType::GroundFix),
            "TEMP" => Some(MessageType::Temp),
            _ => None,
        }
    }

    pub fn is_location(&self) -> bool {
        matches!(self, MessageType::Gnss | MessageType::GroundFix)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type-specific payload of a telemetry record.
///
/// Serialized flat into the record with a `messageType` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType")]
pub enum Reading {
    #[serde(rename = "GNSS")]
    Gnss {
        lat: f64,
        lon: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        accuracy: Option<f64>,
    },
    #[serde(rename = "GROUND_FIX", rename_all = "camelCase")]
    GroundFix {
        lat: f64,
        lon: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        accuracy: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fulfilled_with: Option<String>,
    },
    #[serde(rename = "TEMP")]
    Temp { temperature: f64 },
}

impl Reading {
    pub fn message_type(&self) -> MessageType {
        match self {
            Reading::Gnss { .. } => MessageType::Gnss,
            Reading::GroundFix { .. } => MessageType::GroundFix,
            Reading::Temp { .. } => MessageType::Temp,
        }
    }
}

/// Canonical telemetry record, one per accepted raw message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    pub device_id: String,
    #[serde(with = "shared::time::iso8601_millis")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub reading: Reading,
    pub device_ts: Option<i64>,
    #[serde(default, with = "shared::time::lenient_iso8601")]
    pub received_at: Option<DateTime<Utc>>,
    /// Absolute expiry, epoch seconds.
    pub ttl: Option<i64>,
}

impl TelemetryRecord {
    pub fn message_type(&self) -> MessageType {
        self.reading.message_type()
    }

    /// The natural dedup key of the record.
    pub fn key(&self) -> (&str, DateTime<Utc>) {
        (&self.device_id, self.timestamp)
    }

    /// Location carried by a GNSS or GROUND_FIX record.
    pub fn location(&self) -> Option<Location> {
        let (lat, lon, accuracy, source) = match &self.reading {
            Reading::Gnss { lat, lon, accuracy } => (*lat, *lon, *accuracy, LocationSource::Gnss),
            Reading::GroundFix {
                lat, lon, accuracy, ..
            } => (*lat, *lon, *accuracy, LocationSource::GroundFix),
            Reading::Temp { .. } => return None,
        };

        Some(Location {
            lat,
            lon,
            accuracy,
            source,
            timestamp: Some(self.timestamp),
        })
    }

    /// Temperature carried by a TEMP record.
    pub fn temperature(&self) -> Option<Temperature> {
        match self.reading {
            Reading::Temp { temperature } => Some(Temperature {
                value: temperature,
                timestamp: Some(self.timestamp),
            }),
            _ => None,
        }
    }
}
