//! Safe-zone domain model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A point on the globe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct Coordinates {
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub lon: f64,
}

/// A circular zone configured for one device. Read-only to this service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SafeZone {
    pub device_id: String,
    pub zone_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[validate(nested)]
    pub center: Coordinates,
    #[validate(range(
        exclusive_min = 0.0,
        max = 50000.0,
        message = "Radius must be positive and at most 50000 meters"
    ))]
    pub radius_meters: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl SafeZone {
    /// Name used in events and alerts, falling back to the zone id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.zone_id)
    }
}

/// Per-device map of zone id to "currently inside".
///
/// Ordered so the stored JSON is stable across writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneMembershipStatus(BTreeMap<String, bool>);

impl ZoneMembershipStatus {
    pub fn get(&self, zone_id: &str) -> Option<bool> {
        self.0.get(zone_id).copied()
    }

    pub fn set(&mut self, zone_id: impl Into<String>, inside: bool) {
        self.0.insert(zone_id.into(), inside);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, bool)> for ZoneMembershipStatus {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(radius_meters: f64) -> SafeZone {
        SafeZone {
            device_id: "dev-1".to_string(),
            zone_id: "zone-home".to_string(),
            name: Some("Home".to_string()),
            center: Coordinates {
                lat: 35.6812,
                lon: 139.7671,
            },
            radius_meters,
            enabled: true,
        }
    }

    #[test]
    fn test_valid_zone() {
        assert!(zone(100.0).validate().is_ok());
        assert!(zone(50_000.0).validate().is_ok());
    }

    #[test]
    fn test_invalid_radius() {
        assert!(zone(0.0).validate().is_err());
        assert!(zone(-5.0).validate().is_err());
        assert!(zone(50_001.0).validate().is_err());
    }

    #[test]
    fn test_invalid_center() {
        let mut z = zone(100.0);
        z.center.lat = 91.0;
        assert!(z.validate().is_err());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let mut z = zone(100.0);
        assert_eq!(z.display_name(), "Home");
        z.name = None;
        assert_eq!(z.display_name(), "zone-home");
    }

    #[test]
    fn test_zone_deserialize_defaults_enabled() {
        let z: SafeZone = serde_json::from_str(
            r#"{"deviceId":"dev-1","zoneId":"z1","center":{"lat":1.0,"lon":2.0},"radiusMeters":150}"#,
        )
        .unwrap();
        assert!(z.enabled);
        assert!(z.name.is_none());
    }

    #[test]
    fn test_membership_status_serializes_as_map() {
        let mut status = ZoneMembershipStatus::default();
        status.set("b", false);
        status.set("a", true);
        assert_eq!(
            serde_json::to_string(&status).unwrap(),
            r#"{"a":true,"b":false}"#
        );
        assert_eq!(status.get("a"), Some(true));
        assert_eq!(status.get("c"), None);
    }
}
