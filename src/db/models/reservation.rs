//! Reservation models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TimeslotKey;

/// A user holding one seat on one timeslot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationReservation {
    pub user_id: String,
    pub timeslot: TimeslotKey,
    pub created_at: DateTime<Utc>,
    /// `None` until attendance has been registered.
    pub attended: Option<bool>,
}

impl LocationReservation {
    pub fn new(user_id: impl Into<String>, timeslot: TimeslotKey) -> Self {
        Self {
            user_id: user_id.into(),
            timeslot,
            created_at: Utc::now(),
            attended: None,
        }
    }
}
