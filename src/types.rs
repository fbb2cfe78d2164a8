//! Value objects shared by every entity: instants and record identifiers.
use super::{error::ValidationError, utils};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeStamp(DateTime<Utc>);

impl TimeStamp {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    /// `None` when the calendar values do not name a single UTC instant.
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Self)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    /// `None` when the result falls outside the representable calendar.
    pub fn checked_add(self, delta: TimeDelta) -> Option<Self> {
        self.0.checked_add_signed(delta).map(Self)
    }
    /// Whether the store can encode this instant (nanoseconds since the epoch in an `i64`).
    pub fn is_storable(&self) -> bool {
        self.0.timestamp_nanos_opt().is_some()
    }
}

impl Default for TimeStamp {
    fn default() -> Self {
        Self::new()
    }
}

impl From<DateTime<Utc>> for TimeStamp {
    fn from(value: DateTime<Utc>) -> Self {
        TimeStamp(value)
    }
}

impl Add<TimeDelta> for TimeStamp {
    type Output = TimeStamp;

    fn add(self, rhs: TimeDelta) -> Self::Output {
        TimeStamp(self.0 + rhs)
    }
}

impl Sub<TimeDelta> for TimeStamp {
    type Output = TimeStamp;

    fn sub(self, rhs: TimeDelta) -> Self::Output {
        TimeStamp(self.0 - rhs)
    }
}

impl Sub for TimeStamp {
    type Output = TimeDelta;

    fn sub(self, rhs: TimeStamp) -> Self::Output {
        self.0 - rhs.0
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// stored as nanoseconds since the epoch
impl<C> minicbor::Encode<C> for TimeStamp {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// Opaque record identifier: a uuid7 encoded as bech32m under an entity prefix
/// (`audit_1...`, `doc_1...`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn generate(prefix: &str) -> Result<Self, ValidationError> {
        utils::new_uuid_to_bech32(prefix).map(Self)
    }

    /// Parses an identifier received from outside, checking checksum, prefix and payload size.
    pub fn parse(prefix: &str, raw: &str) -> Result<Self, ValidationError> {
        let (hrp, data) = bech32::decode(raw)
            .map_err(|e| ValidationError::InvalidIdentifier(format!("`{raw}`: {e}")))?;

        if hrp.to_lowercase() != prefix || data.len() != 16 {
            return Err(ValidationError::InvalidIdentifier(format!(
                "`{raw}` is not a `{prefix}` identifier"
            )));
        }

        // bech32 also accepts the all-uppercase form; keys are stored lowercase
        Ok(Self(raw.to_lowercase()))
    }

    // records coming back from the store were written by us, no re-check
    pub(crate) fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
