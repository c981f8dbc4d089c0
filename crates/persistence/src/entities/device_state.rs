//! Device state entity (database row mapping).
//!
//! Maps to the `device_states` table. JSON columns are decoded leniently:
//! a document that no longer matches the current shape reads as absent.

use chrono::{DateTime, Utc};
use domain::models::DeviceState;
use serde::de::DeserializeOwned;
use sqlx::FromRow;

/// Database row mapping for the device_states table.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceStateEntity {
    pub device_id: String,
    pub last_seen: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_location: Option<serde_json::Value>,
    pub last_ground_fix_location: Option<serde_json::Value>,
    pub last_temperature: Option<serde_json::Value>,
    pub in_safe_zone: bool,
    pub safe_zone_status: serde_json::Value,
    pub firmware_version: Option<String>,
}

fn decode<T: DeserializeOwned>(device_id: &str, column: &str, value: Option<serde_json::Value>) -> Option<T> {
    let value = value.filter(|v| !v.is_null())?;
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::warn!(
                device_id = %device_id,
                column = column,
                error = %e,
                "Ignoring undecodable device state column"
            );
            None
        }
    }
}

impl From<DeviceStateEntity> for DeviceState {
    fn from(entity: DeviceStateEntity) -> Self {
        let id = entity.device_id.as_str();
        let last_location = decode(id, "last_location", entity.last_location);
        let last_ground_fix_location =
            decode(id, "last_ground_fix_location", entity.last_ground_fix_location);
        let last_temperature = decode(id, "last_temperature", entity.last_temperature);
        let safe_zone_status =
            decode(id, "safe_zone_status", Some(entity.safe_zone_status)).unwrap_or_default();

        Self {
            device_id: entity.device_id,
            last_seen: entity.last_seen,
            updated_at: entity.updated_at,
            last_location,
            last_ground_fix_location,
            last_temperature,
            in_safe_zone: entity.in_safe_zone,
            safe_zone_status,
            firmware_version: entity.firmware_version,
        }
    }
}
