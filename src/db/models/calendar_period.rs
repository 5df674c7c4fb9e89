//! Calendar period models.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Span of days on which a location opens, and how its opening hours are
/// cut into reservable timeslots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarPeriod {
    pub id: i64,
    pub location_id: i64,
    pub starts_at: NaiveDate,
    pub ends_at: NaiveDate,
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
    pub reservable_from: DateTime<Utc>,
    pub reservable: bool,
    pub timeslot_minutes: u32,
    pub seat_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarPeriodInput {
    pub location_id: i64,
    pub starts_at: NaiveDate,
    pub ends_at: NaiveDate,
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
    pub reservable_from: DateTime<Utc>,
    pub reservable: bool,
    pub timeslot_minutes: u32,
    pub seat_count: u32,
}
