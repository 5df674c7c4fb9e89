//! Reconciling a user's selected timeslots with stored reservations.
//!
//! The selection is diffed against what storage knows; additions and
//! removals are then submitted either in a single transaction or, for
//! callers that only have separate create and delete calls, as two
//! independent requests.

mod commit;
mod diff;
mod error;
mod selection;

pub use commit::{commit, commit_split};
pub use diff::{diff, ReservationDiff};
pub use error::ReservationError;
pub use selection::{CommitMode, ReservationSelection, Toggle};
