use chrono::{DateTime, Utc};

use super::{ReservationDiff, ReservationError};
use crate::db::Database;

/// Submit a diff as one transaction: every change lands or none does.
///
/// Seat and opening checks come back as their own error kinds; anything
/// else is reported as a failed submission.
pub async fn commit(
    db: &Database,
    changes: &ReservationDiff,
    now: DateTime<Utc>,
) -> Result<(), ReservationError> {
    if changes.is_empty() {
        return Ok(());
    }

    db.apply_reservation_changes(changes.to_add.clone(), changes.to_remove.clone(), now)
        .await
        .map_err(|err| match ReservationError::from(err) {
            ReservationError::Storage(inner) => ReservationError::SubmissionFailed(inner),
            domain => domain,
        })
}

/// Submit additions and removals as two independent requests issued
/// together.
///
/// The halves are not atomic: when one fails the other may already be
/// stored, and nothing is rolled back. Callers must reload from storage
/// after an error.
pub async fn commit_split(
    db: &Database,
    changes: &ReservationDiff,
    now: DateTime<Utc>,
) -> Result<(), ReservationError> {
    if changes.is_empty() {
        return Ok(());
    }

    let (added, removed) = tokio::join!(
        db.add_reservations(changes.to_add.clone(), now),
        db.delete_reservations(changes.to_remove.clone())
    );

    added.map_err(ReservationError::SubmissionFailed)?;
    removed.map_err(ReservationError::SubmissionFailed)?;
    Ok(())
}
