//! Device message entity (database row mapping).
//!
//! Maps to the `device_messages` table.

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use domain::models::{MessageType, Reading, TelemetryRecord};
use sqlx::FromRow;

/// Database row mapping for the device_messages table.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceMessageEntity {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub message_type: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub accuracy: Option<f64>,
    pub temperature: Option<f64>,
    pub fulfilled_with: Option<String>,
    pub device_ts: Option<i64>,
    pub received_at: Option<DateTime<Utc>>,
    pub ttl: Option<i64>,
}

/// Column values for one record, flattened from its reading.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageColumns {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub accuracy: Option<f64>,
    pub temperature: Option<f64>,
    pub fulfilled_with: Option<String>,
}

impl From<&Reading> for MessageColumns {
    fn from(reading: &Reading) -> Self {
        match reading {
            Reading::Gnss { lat, lon, accuracy } => Self {
                lat: Some(*lat),
                lon: Some(*lon),
                accuracy: *accuracy,
                temperature: None,
                fulfilled_with: None,
            },
            Reading::GroundFix {
                lat,
                lon,
                accuracy,
                fulfilled_with,
            } => Self {
                lat: Some(*lat),
                lon: Some(*lon),
                accuracy: *accuracy,
                temperature: None,
                fulfilled_with: fulfilled_with.clone(),
            },
            Reading::Temp { temperature } => Self {
                lat: None,
                lon: None,
                accuracy: None,
                temperature: Some(*temperature),
                fulfilled_with: None,
            },
        }
    }
}

impl TryFrom<DeviceMessageEntity> for TelemetryRecord {
    type Error = anyhow::Error;

    fn try_from(entity: DeviceMessageEntity) -> Result<Self, Self::Error> {
        let message_type = MessageType::parse(&entity.message_type)
            .ok_or_else(|| anyhow!("unknown message type {}", entity.message_type))?;

        let reading = match message_type {
            MessageType::Gnss | MessageType::GroundFix => {
                let lat = entity.lat.context("location row without lat")?;
                let lon = entity.lon.context("location row without lon")?;
                if message_type == MessageType::Gnss {
                    Reading::Gnss {
                        lat,
                        lon,
                        accuracy: entity.accuracy,
                    }
                } else {
                    Reading::GroundFix {
                        lat,
                        lon,
                        accuracy: entity.accuracy,
                        fulfilled_with: entity.fulfilled_with,
                    }
                }
            }
            MessageType::Temp => Reading::Temp {
                temperature: entity.temperature.context("TEMP row without temperature")?,
            },
        };

        Ok(Self {
            device_id: entity.device_id,
            timestamp: entity.timestamp,
            reading,
            device_ts: entity.device_ts,
            received_at: entity.received_at,
            ttl: entity.ttl,
        })
    }
}
