use thiserror::Error;

use crate::db::models::TimeslotKey;

#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("timeslot {0} does not exist")]
    UnknownTimeslot(TimeslotKey),
    #[error("timeslot {0} belongs to a calendar period that is not reservable")]
    NotReservable(TimeslotKey),
    #[error("timeslot {0} can't be reserved yet")]
    NotReservableYet(TimeslotKey),
    #[error("there are no more spots left for timeslot {0}")]
    SlotFull(TimeslotKey),
    /// One half of a split commit failed. The other half may have landed.
    #[error("reservation submission failed: {0:#}")]
    SubmissionFailed(anyhow::Error),
    #[error(transparent)]
    Storage(anyhow::Error),
}

impl From<anyhow::Error> for ReservationError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ReservationError>() {
            Ok(reservation_err) => reservation_err,
            Err(other) => ReservationError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn domain_errors_survive_anyhow() {
        let key = TimeslotKey::new(1, 2, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        let wrapped = anyhow::Error::new(ReservationError::SlotFull(key));

        match ReservationError::from(wrapped) {
            ReservationError::SlotFull(k) => assert_eq!(k, key),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn other_errors_become_storage() {
        let err = ReservationError::from(anyhow::anyhow!("disk on fire"));
        assert!(matches!(err, ReservationError::Storage(_)));
        assert_eq!(err.to_string(), "disk on fire");
    }
}
