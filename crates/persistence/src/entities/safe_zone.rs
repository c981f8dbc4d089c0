//! Safe zone entity (database row mapping).

use domain::models::{Coordinates, SafeZone};
use sqlx::FromRow;

/// Database row mapping for the safe_zones table.
#[derive(Debug, Clone, FromRow)]
pub struct SafeZoneEntity {
    pub device_id: String,
    pub zone_id: String,
    pub name: Option<String>,
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_meters: f64,
    pub enabled: bool,
}

impl From<SafeZoneEntity> for SafeZone {
    fn from(entity: SafeZoneEntity) -> Self {
        Self {
            device_id: entity.device_id,
            zone_id: entity.zone_id,
            name: entity.name,
            center: Coordinates {
                lat: entity.center_lat,
                lon: entity.center_lon,
            },
            radius_meters: entity.radius_meters,
            enabled: entity.enabled,
        }
    }
}
