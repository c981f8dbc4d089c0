//! Safe-zone membership with hysteresis.
//!
//! A device inside a zone only counts as having left once it is farther than
//! `radius * (1 + h)` from the center; a device outside only counts as having
//! entered once it is within `radius * (1 - h)`. The first observation of a
//! zone initializes membership from the plain `d <= radius` test and emits
//! nothing.
//!
//! Membership state is passed in and returned, never held by the evaluator.

use chrono::{DateTime, Utc};

use crate::models::{
    EventLocation, Location, LocationSource, SafeZone, SafeZoneState, ZoneEvent,
    ZoneMembershipStatus, ZoneTransition,
};
use shared::validation::{validate_latitude, validate_longitude, validate_radius_meters};

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Default hysteresis band as a fraction of the zone radius.
pub const HYSTERESIS_RATIO: f64 = 0.15;

/// Great-circle distance in meters between two points, via the haversine formula.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Outcome of one evaluation for one device.
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceEvaluation {
    pub status: ZoneMembershipStatus,
    pub events: Vec<ZoneEvent>,
    pub in_safe_zone: bool,
}

impl GeofenceEvaluation {
    /// The part persisted with the device-state row.
    pub fn safe_zone_state(&self) -> SafeZoneState {
        SafeZoneState {
            in_safe_zone: self.in_safe_zone,
            safe_zone_status: self.status.clone(),
        }
    }
}

/// Stateless hysteresis evaluator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceEvaluator {
    hysteresis_ratio: f64,
}

impl Default for GeofenceEvaluator {
    fn default() -> Self {
        Self {
            hysteresis_ratio: HYSTERESIS_RATIO,
        }
    }
}

impl GeofenceEvaluator {
    pub fn new(hysteresis_ratio: f64) -> Self {
        Self { hysteresis_ratio }
    }

    pub fn hysteresis_ratio(&self) -> f64 {
        self.hysteresis_ratio
    }

    /// Next membership for one zone and the transition it implies, if any.
    pub fn next_status(
        &self,
        prior: Option<bool>,
        distance: f64,
        radius: f64,
    ) -> (bool, Option<ZoneTransition>) {
        match prior {
            Some(true) if distance > radius * (1.0 + self.hysteresis_ratio) => {
                (false, Some(ZoneTransition::Exit))
            }
            Some(false) if distance <= radius * (1.0 - self.hysteresis_ratio) => {
                (true, Some(ZoneTransition::Enter))
            }
            Some(inside) => (inside, None),
            None => (distance <= radius, None),
        }
    }

    /// Evaluates a GNSS location against a device's zones.
    ///
    /// Returns `None` for ground fixes, which are never used for boundary
    /// decisions. Disabled or malformed zones are skipped and their prior
    /// membership is carried over unchanged.
    pub fn evaluate(
        &self,
        device_id: &str,
        location: &Location,
        zones: &[SafeZone],
        prior: &ZoneMembershipStatus,
        detected_at: DateTime<Utc>,
    ) -> Option<GeofenceEvaluation> {
        if location.source != LocationSource::Gnss {
            return None;
        }

        let mut status = prior.clone();
        let mut events = Vec::new();
        let mut in_safe_zone = false;

        for zone in zones.iter().filter(|z| z.enabled && is_usable(z)) {
            let distance =
                haversine_distance(location.lat, location.lon, zone.center.lat, zone.center.lon);
            let (inside, transition) =
                self.next_status(prior.get(&zone.zone_id), distance, zone.radius_meters);

            status.set(zone.zone_id.clone(), inside);
            in_safe_zone |= inside;

            if let Some(event_type) = transition {
                events.push(ZoneEvent {
                    device_id: device_id.to_string(),
                    timestamp: location.timestamp.unwrap_or(detected_at),
                    event_type,
                    zone_id: zone.zone_id.clone(),
                    zone_name: zone.display_name().to_string(),
                    location: EventLocation {
                        lat: location.lat,
                        lon: location.lon,
                        accuracy: location.accuracy,
                        timestamp: location.timestamp,
                    },
                    detected_at,
                });
            }
        }

        Some(GeofenceEvaluation {
            status,
            events,
            in_safe_zone,
        })
    }
}

fn is_usable(zone: &SafeZone) -> bool {
    validate_latitude(zone.center.lat).is_ok()
        && validate_longitude(zone.center.lon).is_ok()
        && validate_radius_meters(zone.radius_meters).is_ok()
}
