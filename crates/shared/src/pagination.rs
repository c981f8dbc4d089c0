//! Opaque pagination cursors for range queries against the message log.
//!
//! A cursor carries the last evaluated key of a page, i.e. the
//! `(device_id, timestamp)` pair of the final row the store examined.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::time::{format_iso8601_millis, parse_iso8601};

/// Separator between timestamp and device id. Never appears in a timestamp.
const SEPARATOR: char = '#';

/// Error type for cursor operations.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("Invalid cursor format")]
    InvalidFormat,
    #[error("Invalid cursor encoding")]
    InvalidEncoding,
    #[error("Invalid timestamp in cursor")]
    InvalidTimestamp,
}

/// Encodes a cursor from the last evaluated key.
///
/// The cursor format is: base64(ISO8601_timestamp#device_id)
pub fn encode_cursor(device_id: &str, timestamp: DateTime<Utc>) -> String {
    let raw = format!("{}{}{}", format_iso8601_millis(timestamp), SEPARATOR, device_id);
    URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

/// Decodes a cursor into `(device_id, timestamp)`.
pub fn decode_cursor(cursor: &str) -> Result<(String, DateTime<Utc>), CursorError> {
    let decoded = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| CursorError::InvalidEncoding)?;

    let s = String::from_utf8(decoded).map_err(|_| CursorError::InvalidFormat)?;

    let (timestamp_str, device_id) = s
        .split_once(SEPARATOR)
        .ok_or(CursorError::InvalidFormat)?;

    if device_id.is_empty() {
        return Err(CursorError::InvalidFormat);
    }

    let timestamp = parse_iso8601(timestamp_str).ok_or(CursorError::InvalidTimestamp)?;

    Ok((device_id.to_string(), timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_encode_decode_cursor_roundtrip() {
        let timestamp = Utc.with_ymd_and_hms(2026, 1, 15, 10, 30, 0).unwrap();

        let cursor = encode_cursor("nrf-352656100123456", timestamp);
        let (device_id, decoded_ts) = decode_cursor(&cursor).unwrap();

        assert_eq!(device_id, "nrf-352656100123456");
        assert_eq!(decoded_ts, timestamp);
    }

    #[test]
    fn test_cursor_keeps_milliseconds() {
        let timestamp = Utc
            .with_ymd_and_hms(2026, 6, 15, 14, 30, 45)
            .unwrap()
            .with_nanosecond(123_000_000)
            .unwrap();

        let cursor = encode_cursor("dev", timestamp);
        let (_, decoded_ts) = decode_cursor(&cursor).unwrap();

        assert_eq!(decoded_ts.timestamp_millis(), timestamp.timestamp_millis());
    }

    #[test]
    fn test_device_id_may_contain_separator_like_characters() {
        let timestamp = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let cursor = encode_cursor("fleet:a#b", timestamp);
        let (device_id, _) = decode_cursor(&cursor).unwrap();
        assert_eq!(device_id, "fleet:a#b");
    }

    #[test]
    fn test_decode_invalid_base64() {
        let result = decode_cursor("not-valid-base64!!!");
        assert!(matches!(result, Err(CursorError::InvalidEncoding)));
    }

    #[test]
    fn test_decode_missing_separator() {
        let invalid = URL_SAFE_NO_PAD.encode(b"no-separator-here");
        let result = decode_cursor(&invalid);
        assert!(matches!(result, Err(CursorError::InvalidFormat)));
    }

    #[test]
    fn test_decode_empty_device_id() {
        let invalid = URL_SAFE_NO_PAD.encode(b"2026-01-15T10:30:00.000Z#");
        let result = decode_cursor(&invalid);
        assert!(matches!(result, Err(CursorError::InvalidFormat)));
    }

    #[test]
    fn test_decode_invalid_timestamp() {
        let invalid = URL_SAFE_NO_PAD.encode(b"not-a-timestamp#dev-1");
        let result = decode_cursor(&invalid);
        assert!(matches!(result, Err(CursorError::InvalidTimestamp)));
    }

    #[test]
    fn test_cursor_is_url_safe() {
        let cursor = encode_cursor("nrf-352656100123456", Utc::now());

        // URL_SAFE_NO_PAD should not contain +, /, or =
        assert!(!cursor.contains('+'));
        assert!(!cursor.contains('/'));
        assert!(!cursor.contains('='));
    }
}
