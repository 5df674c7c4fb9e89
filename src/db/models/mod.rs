pub mod calendar_period;
pub mod location;
pub mod penalty;
pub mod reservation;
pub mod timeslot;
pub mod token;

pub use calendar_period::{CalendarPeriod, CalendarPeriodInput};
pub use location::{Location, LocationInput};
pub use penalty::{Penalty, PenaltyEvent, PenaltyInput};
pub use reservation::LocationReservation;
pub use timeslot::{Timeslot, TimeslotKey};
pub use token::{Token, TokenPurpose};
