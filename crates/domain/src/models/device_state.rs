//! Device live-state domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::safe_zone::ZoneMembershipStatus;

/// Where a location fix came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationSource {
    #[default]
    #[serde(rename = "GNSS")]
    Gnss,
    #[serde(rename = "GROUND_FIX")]
    GroundFix,
}

impl LocationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationSource::Gnss => "GNSS",
            LocationSource::GroundFix => "GROUND_FIX",
        }
    }
}

/// A location fix as held in device state.
///
/// The timestamp is read leniently: a stored value that does not parse
/// becomes `None` rather than failing the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub source: LocationSource,
    #[serde(default, with = "shared::time::lenient_iso8601")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Latest temperature reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub value: f64,
    #[serde(default, with = "shared::time::lenient_iso8601")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Proposed update to a device's live-state row, produced per batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStateDelta {
    pub device_id: String,
    pub last_seen: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_location: Option<Location>,
    pub last_ground_fix_location: Option<Location>,
    pub last_temperature: Option<Temperature>,
}

impl DeviceStateDelta {
    /// The GNSS location the geofence check should run against, if any.
    pub fn gnss_location(&self) -> Option<&Location> {
        self.last_location
            .as_ref()
            .filter(|l| l.source == LocationSource::Gnss)
    }
}

/// Geofence outcome written together with a delta.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeZoneState {
    pub in_safe_zone: bool,
    pub safe_zone_status: ZoneMembershipStatus,
}

/// Everything applied to one device-state row in a single store call.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStateUpdate {
    pub delta: DeviceStateDelta,
    pub geofence: Option<SafeZoneState>,
}

/// Stored live-state row for a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    pub device_id: String,
    pub last_seen: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_location: Option<Location>,
    #[serde(default)]
    pub last_ground_fix_location: Option<Location>,
    #[serde(default)]
    pub last_temperature: Option<Temperature>,
    #[serde(default)]
    pub in_safe_zone: bool,
    #[serde(default)]
    pub safe_zone_status: ZoneMembershipStatus,
    #[serde(default)]
    pub firmware_version: Option<String>,
}

impl DeviceState {
    /// Creates an empty row for a device seen for the first time.
    pub fn new(device_id: impl Into<String>, seen_at: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            last_seen: seen_at,
            updated_at: seen_at,
            last_location: None,
            last_ground_fix_location: None,
            last_temperature: None,
            in_safe_zone: false,
            safe_zone_status: ZoneMembershipStatus::default(),
            firmware_version: None,
        }
    }

    /// Applies an update with field-level upsert semantics.
    ///
    /// Absent optional fields leave the stored value untouched.
    pub fn apply(&mut self, update: &DeviceStateUpdate) {
        let delta = &update.delta;
        self.last_seen = delta.last_seen;
        self.updated_at = delta.updated_at;

        if let Some(location) = &delta.last_location {
            self.last_location = Some(location.clone());
        }
        if let Some(location) = &delta.last_ground_fix_location {
            self.last_ground_fix_location = Some(location.clone());
        }
        if let Some(temperature) = &delta.last_temperature {
            self.last_temperature = Some(temperature.clone());
        }
        if let Some(geofence) = &update.geofence {
            self.in_safe_zone = geofence.in_safe_zone;
            self.safe_zone_status = geofence.safe_zone_status.clone();
        }
    }
}

/// Read-side location shape. Inapplicable fields serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationView {
    pub lat: f64,
    pub lon: f64,
    pub accuracy: Option<f64>,
    pub source: LocationSource,
    #[serde(with = "shared::time::lenient_iso8601")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<&Location> for LocationView {
    fn from(location: &Location) -> Self {
        Self {
            lat: location.lat,
            lon: location.lon,
            accuracy: location.accuracy,
            source: location.source,
            timestamp: location.timestamp,
        }
    }
}

/// Read-side summary of a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub device_id: String,
    pub last_location: Option<LocationView>,
    pub last_temperature: Option<Temperature>,
    pub in_safe_zone: bool,
    pub firmware_version: Option<String>,
    #[serde(with = "shared::time::iso8601_millis")]
    pub last_seen: DateTime<Utc>,
}
