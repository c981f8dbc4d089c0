//! Picks the location to report for a device on the read path.

use chrono::{DateTime, Duration, Utc};

use crate::models::{DeviceState, DeviceSummary, Location, LocationView};

/// GNSS fixes older than this fall back to the ground fix.
pub const STALE_AFTER_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy)]
pub struct LocationFreshnessResolver {
    stale_after: Duration,
}

impl Default for LocationFreshnessResolver {
    fn default() -> Self {
        Self {
            stale_after: Duration::minutes(STALE_AFTER_MINUTES),
        }
    }
}

impl LocationFreshnessResolver {
    pub fn new(stale_after: Duration) -> Self {
        Self { stale_after }
    }

    /// A location without a timestamp is never stale.
    pub fn is_stale(&self, location: &Location, now: DateTime<Utc>) -> bool {
        location
            .timestamp
            .map_or(false, |ts| ts < now - self.stale_after)
    }

    /// Prefers the GNSS fix unless it is stale or missing, then the ground
    /// fix, then whatever GNSS fix there is.
    pub fn resolve<'a>(
        &self,
        last_location: Option<&'a Location>,
        last_ground_fix: Option<&'a Location>,
        now: DateTime<Utc>,
    ) -> Option<&'a Location> {
        match last_location {
            Some(gnss) if !self.is_stale(gnss, now) => Some(gnss),
            _ => last_ground_fix.or(last_location),
        }
    }

    /// Builds the read-side summary of a stored device row.
    pub fn summarize(&self, state: &DeviceState, now: DateTime<Utc>) -> DeviceSummary {
        let location = self.resolve(
            state.last_location.as_ref(),
            state.last_ground_fix_location.as_ref(),
            now,
        );

        DeviceSummary {
            device_id: state.device_id.clone(),
            last_location: location.map(LocationView::from),
            last_temperature: state.last_temperature.clone(),
            in_safe_zone: state.in_safe_zone,
            firmware_version: state.firmware_version.clone(),
            last_seen: state.last_seen,
        }
    }
}
