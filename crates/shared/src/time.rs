//! Timestamp helpers.
//!
//! Every timestamp the backend writes is UTC with millisecond precision,
//! e.g. `2026-02-03T10:30:00.000Z`. Parsing is more forgiving: values without
//! fractional seconds and general RFC 3339 offsets are accepted too.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Accepted `Z`-suffixed layouts, tried in order before falling back to RFC 3339.
const ISO8601_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%SZ"];

/// Formats a timestamp as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn format_iso8601_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Converts device epoch milliseconds into a UTC timestamp.
///
/// Returns `None` when the value is outside chrono's representable range.
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Parses an ISO-8601 UTC timestamp.
pub fn parse_iso8601(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for format in ISO8601_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Serde adapter for a required millisecond-precision timestamp.
pub mod iso8601_millis {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_iso8601_millis(*dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_iso8601(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid ISO-8601 timestamp: {raw}")))
    }
}

/// Serde adapter for timestamps read back from storage.
///
/// A missing, null or unparseable value deserializes to `None` instead of
/// failing the whole row.
pub mod lenient_iso8601 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        dt: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match dt {
            Some(dt) => serializer.serialize_str(&super::format_iso8601_millis(*dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<stored::Raw> = Option::deserialize(deserializer)?;
        Ok(raw.and_then(|r| r.into_string()).and_then(|s| super::parse_iso8601(&s)))
    }

    /// Accepts any scalar so a malformed stored value never fails deserialization.
    mod stored {
        use serde::Deserialize;

        #[derive(Deserialize)]
        #[serde(untagged)]
        pub enum Raw {
            Text(String),
            Number(f64),
            Flag(bool),
        }

        impl Raw {
            pub fn into_string(self) -> Option<String> {
                match self {
                    Raw::Text(s) => Some(s),
                    Raw::Number(_) | Raw::Flag(_) => None,
                }
            }
        }
    }
}
