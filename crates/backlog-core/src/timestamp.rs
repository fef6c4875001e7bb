//! Timestamp conversion boundary.
//!
//! Cloud documents carry store-native `{seconds, nanos}` timestamps; projects
//! carry `DateTime<Utc>` serialized as ISO-8601 (RFC 3339, millisecond
//! precision, `Z` suffix). Every conversion between the two goes through this
//! module so the output format is decided in exactly one place.

use crate::error::{Result, StoreError};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Store-native timestamp: seconds since the Unix epoch plus a non-negative
/// nanosecond offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: dt.timestamp(),
            nanos: dt.timestamp_subsec_nanos() as i32,
        }
    }

    /// Convert to a `DateTime`, truncated to millisecond precision.
    pub fn to_datetime(self) -> Result<DateTime<Utc>> {
        if !(0..1_000_000_000).contains(&self.nanos) {
            return Err(StoreError::TimestampRange(format!(
                "nanos {} outside 0..1e9",
                self.nanos
            )));
        }
        DateTime::from_timestamp(self.seconds, self.nanos as u32)
            .map(|dt| dt.trunc_subsecs(3))
            .ok_or_else(|| {
                StoreError::TimestampRange(format!("{}s.{}ns", self.seconds, self.nanos))
            })
    }

    pub fn to_iso8601(self) -> Result<String> {
        Ok(to_iso8601(self.to_datetime()?))
    }

    /// RFC 3339 at full nanosecond precision, for wire formats that carry
    /// timestamps as strings.
    pub fn to_rfc3339(self) -> Result<String> {
        if !(0..1_000_000_000).contains(&self.nanos) {
            return Err(StoreError::TimestampRange(format!(
                "nanos {} outside 0..1e9",
                self.nanos
            )));
        }
        DateTime::from_timestamp(self.seconds, self.nanos as u32)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .ok_or_else(|| {
                StoreError::TimestampRange(format!("{}s.{}ns", self.seconds, self.nanos))
            })
    }

    /// Parse an RFC 3339 string (the wire form some document APIs use) into
    /// the store-native representation.
    pub fn parse(s: &str) -> Result<Self> {
        Ok(Self::from_datetime(parse_iso8601(s)?))
    }
}

/// Current time at the precision projects are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// `max(now, previous)`, keeping `updated_at` non-decreasing even if the
/// wall clock steps backwards.
pub fn advance(previous: DateTime<Utc>) -> DateTime<Utc> {
    now().max(previous)
}

pub fn to_iso8601(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_iso8601(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::TimestampRange(format!("'{s}': {e}")))
}

/// Serde adapter for `DateTime<Utc>` fields on persisted records.
pub mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::to_iso8601(*dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_iso8601(&raw).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn store_timestamp_to_iso() {
        let ts = Timestamp {
            seconds: 1_700_000_000,
            nanos: 123_456_789,
        };
        assert_eq!(ts.to_iso8601().unwrap(), "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn wire_form_keeps_nanos() {
        let ts = Timestamp {
            seconds: 1_700_000_000,
            nanos: 123_456_789,
        };
        let wire = ts.to_rfc3339().unwrap();
        assert_eq!(wire, "2023-11-14T22:13:20.123456789Z");
        assert_eq!(Timestamp::parse(&wire).unwrap(), ts);
    }

    #[test]
    fn datetime_round_trip_keeps_millis() {
        let dt = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap()
            + chrono::Duration::milliseconds(42);
        let ts = Timestamp::from_datetime(dt);
        assert_eq!(ts.to_datetime().unwrap(), dt);
    }

    #[test]
    fn negative_nanos_rejected() {
        let ts = Timestamp {
            seconds: 0,
            nanos: -1,
        };
        assert!(matches!(
            ts.to_datetime(),
            Err(StoreError::TimestampRange(_))
        ));
    }

    #[test]
    fn out_of_range_seconds_rejected() {
        let ts = Timestamp {
            seconds: i64::MAX,
            nanos: 0,
        };
        assert!(ts.to_datetime().is_err());
    }

    #[test]
    fn parse_accepts_offsets() {
        let ts = Timestamp::parse("2024-01-01T01:00:00+01:00").unwrap();
        assert_eq!(ts.to_iso8601().unwrap(), "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_iso8601("yesterday").is_err());
    }

    #[test]
    fn advance_never_goes_backwards() {
        let future = now() + chrono::Duration::hours(1);
        assert_eq!(advance(future), future);
        let past = now() - chrono::Duration::hours(1);
        assert!(advance(past) > past);
    }
}
