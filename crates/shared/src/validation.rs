//! Coordinate and radius checks shared by the transformer, the safe-zone
//! model and the stores. NaN and infinities are always rejected.

use std::borrow::Cow;
use std::ops::RangeInclusive;

use validator::ValidationError;

/// Largest safe-zone radius accepted, in meters.
pub const MAX_RADIUS_METERS: f64 = 50_000.0;

const LATITUDE: RangeInclusive<f64> = -90.0..=90.0;
const LONGITUDE: RangeInclusive<f64> = -180.0..=180.0;

fn out_of_range(code: &'static str, message: &'static str, value: f64) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err.add_param(Cow::Borrowed("value"), &value);
    err
}

/// Latitude in degrees, `[-90, 90]`.
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if LATITUDE.contains(&lat) {
        Ok(())
    } else {
        Err(out_of_range(
            "latitude_range",
            "Latitude must be between -90 and 90",
            lat,
        ))
    }
}

/// Longitude in degrees, `[-180, 180]`.
pub fn validate_longitude(lon: f64) -> Result<(), ValidationError> {
    if LONGITUDE.contains(&lon) {
        Ok(())
    } else {
        Err(out_of_range(
            "longitude_range",
            "Longitude must be between -180 and 180",
            lon,
        ))
    }
}

/// Radius in meters, `(0, MAX_RADIUS_METERS]`.
pub fn validate_radius_meters(radius: f64) -> Result<(), ValidationError> {
    if radius > 0.0 && radius <= MAX_RADIUS_METERS {
        Ok(())
    } else {
        Err(out_of_range(
            "radius_range",
            "Radius must be positive and at most 50000 meters",
            radius,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latitude_bounds() {
        for ok in [0.0, 90.0, -90.0, 35.681236] {
            assert!(validate_latitude(ok).is_ok(), "{ok} should pass");
        }
        for bad in [90.0001, -90.0001, f64::NAN, f64::INFINITY] {
            assert!(validate_latitude(bad).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn test_longitude_bounds() {
        for ok in [0.0, 180.0, -180.0, 139.767125] {
            assert!(validate_longitude(ok).is_ok(), "{ok} should pass");
        }
        for bad in [180.0001, -180.0001, f64::NAN, f64::NEG_INFINITY] {
            assert!(validate_longitude(bad).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn test_error_carries_code_message_and_value() {
        let err = validate_latitude(100.0).unwrap_err();
        assert_eq!(err.code, "latitude_range");
        assert_eq!(
            err.message.as_deref(),
            Some("Latitude must be between -90 and 90")
        );
        assert_eq!(err.params["value"], 100.0);
    }

    #[test]
    fn test_radius_bounds() {
        assert!(validate_radius_meters(100.0).is_ok());
        assert!(validate_radius_meters(MAX_RADIUS_METERS).is_ok());
        assert!(validate_radius_meters(0.0).is_err());
        assert!(validate_radius_meters(-5.0).is_err());
        assert!(validate_radius_meters(f64::NAN).is_err());
        assert!(validate_radius_meters(MAX_RADIUS_METERS + 1.0).is_err());
    }
}
