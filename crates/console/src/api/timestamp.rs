//! Serde adapter for server timestamps.
//!
//! The backend emits naive ISO-8601 values (`2024-03-01T09:30:00.123456`)
//! that are implicitly UTC; RFC 3339 values with an offset are accepted too.
//! Values are always written back as RFC 3339.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

pub fn parse(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

/// Same adapter for optional fields; `null` and absent map to `None`.
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => super::serialize(dt, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn naive_backend_timestamps_are_utc() {
        let dt = parse("2024-03-01T09:30:00.123456").expect("naive timestamp");
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 1));
        assert_eq!((dt.hour(), dt.minute()), (9, 30));
    }

    #[test]
    fn offsets_are_normalised() {
        let dt = parse("2024-03-01T11:30:00+02:00").expect("rfc3339 timestamp");
        assert_eq!(dt.hour(), 9);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse("yesterday").is_none());
    }
}
