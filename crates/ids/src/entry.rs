//! Time-prefixed entry identifiers.

use crate::canonical::parse_canonical;
use crate::IdError;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3f";

/// A server-assigned identifier whose prefix is the submission time.
///
/// Ordering compares the timestamp first and the UUID second, so sorting a list of
/// entries by id sorts them by submission time with a deterministic tie-break.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntryId {
    timestamp: DateTime<Utc>,
    uuid: Uuid,
}

impl EntryId {
    /// The submission time encoded in this id (millisecond precision).
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }
}

impl Ord for EntryId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.uuid.cmp(&other.uuid))
    }
}

impl PartialOrd for EntryId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Z-{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.uuid.simple()
        )
    }
}

impl FromStr for EntryId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ts_str, uuid_str) = s
            .split_once('-')
            .ok_or_else(|| IdError::InvalidInput(format!("invalid entry id format: '{s}'")))?;

        let ts_no_z = ts_str.strip_suffix('Z').ok_or_else(|| {
            IdError::InvalidInput(format!("entry timestamp must end with 'Z': '{ts_str}'"))
        })?;

        let naive = NaiveDateTime::parse_from_str(ts_no_z, TIMESTAMP_FORMAT).map_err(|e| {
            IdError::InvalidInput(format!("invalid entry timestamp '{ts_str}': {e}"))
        })?;

        Ok(Self {
            timestamp: DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc),
            uuid: parse_canonical("entry", uuid_str)?,
        })
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for EntryId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for EntryId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Issues [`EntryId`]s and edit timestamps that strictly increase.
///
/// If the wall clock has not advanced past the previous value (or has gone backwards),
/// the previous value plus one millisecond is used instead. One generator is owned by each
/// handover session, so everything the session stamps is totally ordered.
#[derive(Clone, Debug, Default)]
pub struct EntryIdGenerator {
    last: Option<DateTime<Utc>>,
}

impl EntryIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes after a previously issued timestamp, e.g. when carrying entries forward
    /// from an earlier session.
    pub fn resume_after(last: DateTime<Utc>) -> Self {
        Self { last: Some(last) }
    }

    /// Returns the next strictly increasing timestamp, truncated to milliseconds.
    pub fn stamp(&mut self) -> DateTime<Utc> {
        self.stamp_at(Utc::now())
    }

    /// Like [`stamp`](Self::stamp) but with an explicit "now".
    pub fn stamp_at(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now = truncate_to_millis(now);
        let next = match self.last {
            Some(prev) if now <= prev => prev + Duration::milliseconds(1),
            _ => now,
        };
        self.last = Some(next);
        next
    }

    /// Issues a new entry id stamped with the next timestamp.
    pub fn next_id(&mut self) -> EntryId {
        EntryId {
            timestamp: self.stamp(),
            uuid: Uuid::new_v4(),
        }
    }

    /// Advances the generator past an existing id, so ids issued afterwards sort after it.
    pub fn observe(&mut self, id: &EntryId) {
        if self.last.map_or(true, |last| last < id.timestamp) {
            self.last = Some(id.timestamp);
        }
    }
}

fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ids_are_strictly_increasing_even_with_a_frozen_clock() {
        let mut generator = EntryIdGenerator::new();
        let frozen = Utc.with_ymd_and_hms(2026, 1, 11, 14, 35, 22).unwrap();
        let a = generator.stamp_at(frozen);
        let b = generator.stamp_at(frozen);
        let c = generator.stamp_at(frozen - Duration::seconds(5));
        assert!(a < b && b < c);
        assert_eq!(b - a, Duration::milliseconds(1));
    }

    #[test]
    fn display_and_parse_agree() {
        let mut generator = EntryIdGenerator::new();
        let id = generator.next_id();
        let text = id.to_string();
        assert_eq!(text.len(), "20260111T143522.045Z-".len() + 32);
        let parsed: EntryId = text.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        assert!("20260111T143522.045-550e8400e29b41d4a716446655440000"
            .parse::<EntryId>()
            .is_err());
        assert!("20260111T143522.045Z-550E8400E29B41D4A716446655440000"
            .parse::<EntryId>()
            .is_err());
        assert!("nonsense".parse::<EntryId>().is_err());
    }

    #[test]
    fn ordering_follows_timestamp_first() {
        let early: EntryId = "20260111T080000.000Z-ffffffffffffffffffffffffffffffff"
            .parse()
            .unwrap();
        let late: EntryId = "20260111T090000.000Z-00000000000000000000000000000000"
            .parse()
            .unwrap();
        assert!(early < late);
    }

    #[test]
    fn observe_moves_generator_past_existing_ids() {
        let future: EntryId = "29990101T000000.000Z-00000000000000000000000000000000"
            .parse()
            .unwrap();
        let mut generator = EntryIdGenerator::new();
        generator.observe(&future);
        assert!(generator.next_id() > future);
    }
}
