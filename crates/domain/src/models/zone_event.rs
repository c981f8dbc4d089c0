//! Zone transition event domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a zone-membership transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneTransition {
    #[serde(rename = "ZONE_ENTER")]
    Enter,
    #[serde(rename = "ZONE_EXIT")]
    Exit,
}

impl ZoneTransition {
    /// Converts to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneTransition::Enter => "ZONE_ENTER",
            ZoneTransition::Exit => "ZONE_EXIT",
        }
    }

    /// Parses from database string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ZONE_ENTER" => Some(ZoneTransition::Enter),
            "ZONE_EXIT" => Some(ZoneTransition::Exit),
            _ => None,
        }
    }
}

/// The location that triggered a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLocation {
    pub lat: f64,
    pub lon: f64,
    pub accuracy: Option<f64>,
    #[serde(default, with = "shared::time::lenient_iso8601")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A zone entry or exit, logged under `(device_id, timestamp, zone_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneEvent {
    pub device_id: String,
    /// Location timestamp when known, else the detection time.
    #[serde(with = "shared::time::iso8601_millis")]
    pub timestamp: DateTime<Utc>,
    pub event_type: ZoneTransition,
    pub zone_id: String,
    pub zone_name: String,
    pub location: EventLocation,
    #[serde(with = "shared::time::iso8601_millis")]
    pub detected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_transition_strings() {
        assert_eq!(ZoneTransition::Enter.as_str(), "ZONE_ENTER");
        assert_eq!(ZoneTransition::parse("ZONE_EXIT"), Some(ZoneTransition::Exit));
        assert_eq!(ZoneTransition::parse("zone_exit"), None);
    }

    #[test]
    fn test_event_serialization() {
        let ts = Utc.with_ymd_and_hms(2026, 2, 3, 10, 30, 0).unwrap();
        let event = ZoneEvent {
            device_id: "dev-1".to_string(),
            timestamp: ts,
            event_type: ZoneTransition::Exit,
            zone_id: "zone-home".to_string(),
            zone_name: "Home".to_string(),
            location: EventLocation {
                lat: 35.68,
                lon: 139.77,
                accuracy: None,
                timestamp: Some(ts),
            },
            detected_at: ts,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "ZONE_EXIT");
        assert_eq!(json["zoneName"], "Home");
        assert!(json["location"]["accuracy"].is_null());
        assert_eq!(json["detectedAt"], "2026-02-03T10:30:00.000Z");
    }
}
