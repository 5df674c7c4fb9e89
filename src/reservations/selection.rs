use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use super::{commit, diff, ReservationDiff, ReservationError};
use crate::db::{
    models::{LocationReservation, Timeslot, TimeslotKey},
    Database,
};

/// What a click on a timeslot did to the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Selected,
    Unselected,
    /// The timeslot only opens for reservations later; nothing changed.
    NotReservableYet,
    /// Every seat is taken and the user holds none of them; nothing changed.
    Full,
}

/// Which submission path [`ReservationSelection::commit`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommitMode {
    #[default]
    Transactional,
    Split,
}

/// A user's working set of reservations at one location.
///
/// Starts out equal to what storage knows, is edited one timeslot at a time
/// and is reconciled with storage on commit. No timeslot appears twice.
#[derive(Debug, Clone)]
pub struct ReservationSelection {
    user_id: String,
    location_id: Option<i64>,
    original: Vec<LocationReservation>,
    selected: Vec<LocationReservation>,
    modified: bool,
}

impl ReservationSelection {
    pub fn new(
        user_id: impl Into<String>,
        location_id: Option<i64>,
        original: Vec<LocationReservation>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            location_id,
            selected: original.clone(),
            original,
            modified: false,
        }
    }

    pub async fn load(
        db: &Database,
        user_id: &str,
        location_id: Option<i64>,
    ) -> Result<Self, ReservationError> {
        let original = db.list_reservations_for_user(user_id, location_id).await?;
        Ok(Self::new(user_id, location_id, original))
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn original(&self) -> &[LocationReservation] {
        &self.original
    }

    pub fn selected(&self) -> &[LocationReservation] {
        &self.selected
    }

    pub fn is_selected(&self, key: &TimeslotKey) -> bool {
        self.selected.iter().any(|r| r.timeslot == *key)
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn toggle(&mut self, timeslot: &Timeslot, now: DateTime<Utc>) -> Toggle {
        if !timeslot.is_reservable_at(now) {
            return Toggle::NotReservableYet;
        }

        let key = timeslot.key;
        let selected = self.is_selected(&key);
        if timeslot.is_full() && !selected {
            return Toggle::Full;
        }

        self.modified = true;
        if selected {
            self.selected.retain(|r| r.timeslot != key);
            Toggle::Unselected
        } else {
            self.selected
                .push(LocationReservation::new(self.user_id.clone(), key));
            Toggle::Selected
        }
    }

    pub fn pending(&self) -> ReservationDiff {
        diff(&self.original, &self.selected)
    }

    /// Submit pending changes, then reload from storage whatever the outcome.
    ///
    /// On success the applied diff is returned. On failure the selection is
    /// still reset to the authoritative list and stays marked as modified so
    /// the caller can offer a retry.
    pub async fn commit(
        &mut self,
        db: &Database,
        mode: CommitMode,
        now: DateTime<Utc>,
    ) -> Result<ReservationDiff, ReservationError> {
        let changes = self.pending();
        let submitted = match mode {
            CommitMode::Transactional => commit::commit(db, &changes, now).await,
            CommitMode::Split => commit::commit_split(db, &changes, now).await,
        };

        match submitted {
            Ok(()) => {
                self.reload(db).await?;
                Ok(changes)
            }
            Err(err) => {
                if let Err(reload_err) = self.reload(db).await {
                    warn!(
                        "Failed to reload reservations of {} after failed commit: {reload_err}",
                        self.user_id
                    );
                }
                self.modified = true;
                Err(err)
            }
        }
    }

    /// Replace both the original and the selection with what storage holds.
    pub async fn reload(&mut self, db: &Database) -> Result<(), ReservationError> {
        let original = db
            .list_reservations_for_user(&self.user_id, self.location_id)
            .await?;
        self.selected = original.clone();
        self.original = original;
        self.modified = false;
        Ok(())
    }
}
