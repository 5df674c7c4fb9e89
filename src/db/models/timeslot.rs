//! Timeslot models.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a reservable timeslot.
///
/// Two keys are equal iff calendar id, sequence number and calendar date
/// match. The date carries no time-of-day, so values that went through a
/// datetime serialization compare equal once converted with
/// [`TimeslotKey::from_datetime`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct TimeslotKey {
    pub calendar_id: i64,
    pub seqnr: u32,
    pub date: NaiveDate,
}

impl TimeslotKey {
    pub fn new(calendar_id: i64, seqnr: u32, date: NaiveDate) -> Self {
        Self {
            calendar_id,
            seqnr,
            date,
        }
    }

    pub fn from_datetime(calendar_id: i64, seqnr: u32, at: NaiveDateTime) -> Self {
        Self::new(calendar_id, seqnr, at.date())
    }
}

impl fmt::Display for TimeslotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "calendar {} slot {} on {}",
            self.calendar_id, self.seqnr, self.date
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Timeslot {
    #[serde(flatten)]
    pub key: TimeslotKey,
    pub location_id: i64,
    pub seat_count: u32,
    pub amount_of_reservations: u32,
    pub reservable_from: DateTime<Utc>,
}

impl Timeslot {
    pub fn is_full(&self) -> bool {
        self.amount_of_reservations >= self.seat_count
    }

    pub fn is_reservable_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.reservable_from
    }
}
