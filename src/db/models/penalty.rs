use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A kind of offence and the points it costs by default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyEvent {
    pub code: u32,
    pub points: u32,
    pub public_accessible: bool,
    /// Description per language code, e.g. `"en"` or `"nl"`.
    pub descriptions: BTreeMap<String, String>,
}

impl PenaltyEvent {
    pub const LATE_CANCEL: u32 = 16660;
    pub const NO_SHOW: u32 = 16661;
    pub const MANUAL_ENTRY: u32 = 16663;
}

/// One entry in the penalty book.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Penalty {
    pub id: i64,
    pub user_id: String,
    pub event_code: u32,
    pub created_at: DateTime<Utc>,
    pub reservation_date: Option<NaiveDate>,
    pub location_id: Option<i64>,
    pub received_points: u32,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyInput {
    pub user_id: String,
    pub event_code: u32,
    pub reservation_date: Option<NaiveDate>,
    pub location_id: Option<i64>,
    /// Points to hand out; `None` takes the event's default.
    pub received_points: Option<u32>,
    pub remarks: Option<String>,
}
