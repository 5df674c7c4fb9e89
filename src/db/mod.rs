mod connection;
mod helpers;
mod migrations;
pub mod models;
pub(crate) mod repositories;

pub use connection::Database;
pub use models::{
    CalendarPeriod, CalendarPeriodInput, Location, LocationInput, LocationReservation, Penalty,
    PenaltyEvent, PenaltyInput, Timeslot, TimeslotKey, Token, TokenPurpose,
};
