use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{FlowError, Result};

/// Point in time attached to admissions, transfers, discharges and bed
/// status changes. Serialized as RFC 3339.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub OffsetDateTime);

impl Timestamp {
    pub fn new(datetime: OffsetDateTime) -> Self {
        Self(datetime)
    }

    pub fn inner(&self) -> &OffsetDateTime {
        &self.0
    }

    pub fn unix_timestamp(&self) -> i64 {
        self.0.unix_timestamp()
    }

    pub fn from_unix_timestamp(timestamp: i64) -> Result<Self> {
        OffsetDateTime::from_unix_timestamp(timestamp)
            .map(Self)
            .map_err(|e| {
                FlowError::invalid_timestamp(format!("Invalid Unix timestamp {timestamp}: {e}"))
            })
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(datetime: OffsetDateTime) -> Self {
        Self(datetime)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self.0.format(&Rfc3339).map_err(|_| fmt::Error)?;
        write!(f, "{formatted}")
    }
}

impl FromStr for Timestamp {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        let datetime = OffsetDateTime::parse(s, &Rfc3339).map_err(|e| {
            FlowError::invalid_timestamp(format!("Failed to parse timestamp '{s}': {e}"))
        })?;
        Ok(Timestamp(datetime))
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = self.0.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Timestamp::from_str(&s).map_err(serde::de::Error::custom)
    }
}

pub fn now_utc() -> Timestamp {
    Timestamp(OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_timestamp_display() {
        let ts = Timestamp::new(datetime!(2024-03-01 08:15:00 UTC));
        assert_eq!(ts.to_string(), "2024-03-01T08:15:00Z");
    }

    #[test]
    fn test_timestamp_parse() {
        let ts: Timestamp = "2024-03-01T08:15:00Z".parse().unwrap();
        assert_eq!(ts.inner(), &datetime!(2024-03-01 08:15:00 UTC));

        let err = "yesterday".parse::<Timestamp>().unwrap_err();
        assert!(matches!(err, FlowError::InvalidTimestamp(_)));
    }

    #[test]
    fn test_timestamp_serde() {
        let ts = Timestamp::new(datetime!(2024-03-01 08:15:00 UTC));
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2024-03-01T08:15:00Z\"");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn test_timestamp_ordering() {
        let earlier = Timestamp::from_unix_timestamp(1_700_000_000).unwrap();
        let later = Timestamp::from_unix_timestamp(1_700_003_600).unwrap();
        assert!(earlier < later);
    }
}
