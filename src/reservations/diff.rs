use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::db::models::{LocationReservation, TimeslotKey};

/// Changes needed to turn the server-known reservations into the selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationDiff {
    pub to_add: Vec<LocationReservation>,
    pub to_remove: Vec<LocationReservation>,
}

impl ReservationDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

fn keys(reservations: &[LocationReservation]) -> HashSet<TimeslotKey> {
    reservations.iter().map(|r| r.timeslot).collect()
}

/// `to_add = selected \ original`, `to_remove = original \ selected`, with
/// membership decided by timeslot identity alone. Input order is kept.
pub fn diff(original: &[LocationReservation], selected: &[LocationReservation]) -> ReservationDiff {
    let original_keys = keys(original);
    let selected_keys = keys(selected);

    ReservationDiff {
        to_add: selected
            .iter()
            .filter(|r| !original_keys.contains(&r.timeslot))
            .cloned()
            .collect(),
        to_remove: original
            .iter()
            .filter(|r| !selected_keys.contains(&r.timeslot))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn slot(calendar_id: i64, seqnr: u32, day: u32) -> TimeslotKey {
        TimeslotKey::new(calendar_id, seqnr, NaiveDate::from_ymd_opt(2024, 4, day).unwrap())
    }

    fn res(user: &str, key: TimeslotKey) -> LocationReservation {
        LocationReservation::new(user, key)
    }

    #[test]
    fn identical_sets_produce_no_changes() {
        let set = vec![res("u1", slot(1, 0, 2)), res("u1", slot(1, 1, 2))];
        assert!(diff(&set, &set).is_empty());
        assert!(diff(&[], &[]).is_empty());
    }

    #[test]
    fn empty_original_adds_everything() {
        let selected = vec![res("u1", slot(1, 0, 2)), res("u1", slot(2, 0, 3))];
        let d = diff(&[], &selected);
        assert_eq!(d.to_add, selected);
        assert!(d.to_remove.is_empty());
    }

    #[test]
    fn empty_selection_removes_everything() {
        let original = vec![res("u1", slot(1, 0, 2)), res("u1", slot(2, 0, 3))];
        let d = diff(&original, &[]);
        assert!(d.to_add.is_empty());
        assert_eq!(d.to_remove, original);
    }

    #[test]
    fn partial_overlap() {
        let a = slot(1, 0, 2);
        let b = slot(1, 1, 2);
        let c = slot(1, 2, 2);

        let original = vec![res("user1", a), res("user1", b)];
        let selected = vec![res("user1", b), res("user1", c)];
        let d = diff(&original, &selected);

        assert_eq!(d.to_add, vec![selected[1].clone()]);
        assert_eq!(d.to_remove, vec![original[0].clone()]);
        assert_eq!(d.to_add[0].timeslot, c);
        assert_eq!(d.to_remove[0].timeslot, a);
    }

    #[test]
    fn time_of_day_does_not_matter() {
        let date = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
        let midnight = date.and_time(NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        let afternoon = date.and_time(NaiveTime::from_hms_opt(14, 30, 12).unwrap());

        let a = res("u1", TimeslotKey::from_datetime(7, 3, midnight));
        let b = res("u1", TimeslotKey::from_datetime(7, 3, afternoon));
        assert!(diff(&[a], &[b]).is_empty());
    }

    #[test]
    fn every_identity_component_counts() {
        let base = slot(1, 0, 2);
        for other in [slot(2, 0, 2), slot(1, 1, 2), slot(1, 0, 3)] {
            let d = diff(&[res("u1", base)], &[res("u1", other)]);
            assert_eq!(d.to_add.len(), 1);
            assert_eq!(d.to_remove.len(), 1);
        }
    }
}
