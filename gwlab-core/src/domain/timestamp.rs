//! Observation timestamps.
//!
//! Readings arrive either as ISO dates (`2024-03-01`, midnight implied) or as
//! ISO date-times with or without an offset. Offsets are normalised to UTC and
//! dropped; everything downstream works on `NaiveDateTime`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serializer};

const OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO date or date-time. Returns `None` for anything unparseable.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Serde adapter used by every reading type.
pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.format(OUTPUT_FORMAT).to_string())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_only_means_midnight() {
        let ts = parse_timestamp("2024-03-01").unwrap();
        assert_eq!(ts.to_string(), "2024-03-01 00:00:00");
    }

    #[test]
    fn rfc3339_offset_is_normalised_to_utc() {
        let ts = parse_timestamp("2024-03-01T07:00:00+07:00").unwrap();
        assert_eq!(ts.to_string(), "2024-03-01 00:00:00");
    }

    #[test]
    fn naive_datetime_forms_parse() {
        assert!(parse_timestamp("2024-03-01T10:30:00").is_some());
        assert!(parse_timestamp("2024-03-01 10:30").is_some());
        assert!(parse_timestamp("2024-03-01T10:30:00.250").is_some());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2024-13-01").is_none());
    }
}
