//! Raw vendor message to canonical telemetry record.
//!
//! The transformer is a pure function: it either produces a
//! [`TelemetryRecord`] or returns a [`Discard`] describing why the message
//! was skipped. Logging and counting discards is left to the caller.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::models::{AppId, MessageType, RawMessage, RawPayload, Reading, TelemetryRecord};
use shared::time::{from_epoch_millis, parse_iso8601};
use shared::validation::{validate_latitude, validate_longitude};

/// Days a record is kept before it may be purged.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Why a raw message produced no record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Discard {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Missing deviceId")]
    MissingDeviceId,

    #[error("Missing message body")]
    MissingMessage,

    #[error("Unsupported appId: {0}")]
    UnsupportedAppId(String),

    #[error("GROUND_FIX positioning request")]
    PositioningRequest,

    #[error("{0} message missing lat/lon")]
    MissingCoordinates(MessageType),

    #[error("{0} message has non-numeric lat/lon")]
    InvalidCoordinates(MessageType),

    #[error("{0} message has lat/lon out of range")]
    CoordinatesOutOfRange(MessageType),

    #[error("TEMP message missing data")]
    MissingTemperature,

    #[error("TEMP message data is not numeric")]
    InvalidTemperature,

    #[error("No usable timestamp")]
    MissingTimestamp,
}

impl Discard {
    /// Discards that are part of normal traffic rather than bad input.
    pub fn is_expected(&self) -> bool {
        matches!(self, Discard::UnsupportedAppId(_) | Discard::PositioningRequest)
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Discard::Malformed(_) => "malformed",
            Discard::MissingDeviceId => "missing_device_id",
            Discard::MissingMessage => "missing_message",
            Discard::UnsupportedAppId(_) => "unsupported_app_id",
            Discard::PositioningRequest => "positioning_request",
            Discard::MissingCoordinates(_) => "missing_coordinates",
            Discard::InvalidCoordinates(_) => "invalid_coordinates",
            Discard::CoordinatesOutOfRange(_) => "coordinates_out_of_range",
            Discard::MissingTemperature => "missing_temperature",
            Discard::InvalidTemperature => "invalid_temperature",
            Discard::MissingTimestamp => "missing_timestamp",
        }
    }
}

/// Transforms one batch entry that has not been deserialized yet.
pub fn transform_value(value: &Value) -> Result<TelemetryRecord, Discard> {
    let raw: RawMessage = serde_json::from_value(value.clone())
        .map_err(|e| Discard::Malformed(e.to_string()))?;
    transform(&raw)
}

/// Transforms a raw message into a canonical record.
pub fn transform(raw: &RawMessage) -> Result<TelemetryRecord, Discard> {
    let device_id = raw
        .device_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or(Discard::MissingDeviceId)?;

    let payload = raw
        .message
        .as_ref()
        .filter(|m| !m.is_empty())
        .ok_or(Discard::MissingMessage)?;

    let reading = match AppId::parse(payload.app_id.as_deref().unwrap_or_default()) {
        AppId::Gnss => gnss_reading(&payload.data)?,
        AppId::GroundFix => ground_fix_reading(&payload.data)?,
        AppId::Temp => temp_reading(&payload.data)?,
        AppId::Unsupported(app_id) => return Err(Discard::UnsupportedAppId(app_id)),
    };

    let received_at = raw.received_at.as_deref().and_then(parse_iso8601);
    let device_ts = payload.ts.filter(|ts| *ts != 0);
    let timestamp = resolve_timestamp(payload, received_at)?;

    Ok(TelemetryRecord {
        device_id: device_id.to_string(),
        timestamp,
        reading,
        device_ts,
        received_at,
        ttl: device_ts.map(calculate_ttl),
    })
}

/// Absolute expiry in epoch seconds for a device timestamp in epoch millis.
pub fn calculate_ttl(device_ts_ms: i64) -> i64 {
    device_ts_ms.div_euclid(1000) + Duration::days(DEFAULT_RETENTION_DAYS).num_seconds()
}

/// Device clock when set, else receipt time.
fn resolve_timestamp(
    payload: &RawPayload,
    received_at: Option<DateTime<Utc>>,
) -> Result<DateTime<Utc>, Discard> {
    payload
        .ts
        .filter(|ts| *ts != 0)
        .and_then(from_epoch_millis)
        .or(received_at)
        .ok_or(Discard::MissingTimestamp)
}

fn gnss_reading(data: &Value) -> Result<Reading, Discard> {
    let pvt = data.get("pvt").unwrap_or(&Value::Null);
    let (lat, lon) = coordinates(pvt, MessageType::Gnss)?;

    Ok(Reading::Gnss {
        lat,
        lon,
        accuracy: pvt.get("acc").and_then(number),
    })
}

fn ground_fix_reading(data: &Value) -> Result<Reading, Discard> {
    if data.get("lte").is_some() {
        return Err(Discard::PositioningRequest);
    }
    let (lat, lon) = coordinates(data, MessageType::GroundFix)?;

    Ok(Reading::GroundFix {
        lat,
        lon,
        accuracy: data.get("uncertainty").and_then(number),
        fulfilled_with: data
            .get("fulfilledWith")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    })
}

fn temp_reading(data: &Value) -> Result<Reading, Discard> {
    if data.is_null() {
        return Err(Discard::MissingTemperature);
    }
    let temperature = number(data).ok_or(Discard::InvalidTemperature)?;
    Ok(Reading::Temp { temperature })
}

fn coordinates(obj: &Value, message_type: MessageType) -> Result<(f64, f64), Discard> {
    let lat = obj.get("lat").filter(|v| !v.is_null());
    let lon = obj.get("lon").filter(|v| !v.is_null());

    let (Some(lat), Some(lon)) = (lat, lon) else {
        return Err(Discard::MissingCoordinates(message_type));
    };
    let (Some(lat), Some(lon)) = (number(lat), number(lon)) else {
        return Err(Discard::InvalidCoordinates(message_type));
    };

    if validate_latitude(lat).is_err() || validate_longitude(lon).is_err() {
        return Err(Discard::CoordinatesOutOfRange(message_type));
    }
    Ok((lat, lon))
}

/// Reads a finite number from a JSON number or numeric string.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}
