//! Calendar periods and the timeslots they generate.
//!
//! A period covers the dates `starts_at..=ends_at`. On each of those days
//! the opening hours are cut into consecutive timeslots of
//! `timeslot_minutes`, numbered from zero. A trailing remainder shorter than
//! one timeslot is not reservable. Periods that are not reservable get a
//! single timeslot per day covering the whole opening window.

use chrono::{Duration, NaiveTime};
use thiserror::Error;

use crate::db::models::{CalendarPeriod, CalendarPeriodInput, TimeslotKey};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("calendar period ends before it starts")]
    EndsBeforeStart,
    #[error("closing time must be after opening time")]
    ClosingNotAfterOpening,
    #[error("timeslot length must be greater than zero")]
    ZeroTimeslotLength,
    #[error("timeslot length of {0} minutes exceeds the opening hours")]
    TimeslotLongerThanOpeningHours(u32),
    #[error("a reservable period needs at least one seat")]
    NoSeats,
}

pub fn validate_period(input: &CalendarPeriodInput) -> Result<(), CalendarError> {
    if input.ends_at < input.starts_at {
        return Err(CalendarError::EndsBeforeStart);
    }
    if input.closing_time <= input.opening_time {
        return Err(CalendarError::ClosingNotAfterOpening);
    }
    if input.reservable {
        if input.timeslot_minutes == 0 {
            return Err(CalendarError::ZeroTimeslotLength);
        }
        if slots_per_day(input) == 0 {
            return Err(CalendarError::TimeslotLongerThanOpeningHours(
                input.timeslot_minutes,
            ));
        }
        if input.seat_count == 0 {
            return Err(CalendarError::NoSeats);
        }
    }
    Ok(())
}

fn opening_minutes(opening: NaiveTime, closing: NaiveTime) -> i64 {
    (closing - opening).num_minutes().max(0)
}

fn count_slots(reservable: bool, opening: NaiveTime, closing: NaiveTime, timeslot_minutes: u32) -> u32 {
    if !reservable {
        return 1;
    }
    if timeslot_minutes == 0 {
        return 0;
    }
    let minutes = opening_minutes(opening, closing);
    u32::try_from(minutes / i64::from(timeslot_minutes)).unwrap_or(u32::MAX)
}

fn slots_per_day(input: &CalendarPeriodInput) -> u32 {
    count_slots(
        input.reservable,
        input.opening_time,
        input.closing_time,
        input.timeslot_minutes,
    )
}

/// Number of timeslots `period` has on each of its days.
pub fn period_slots_per_day(period: &CalendarPeriod) -> u32 {
    count_slots(
        period.reservable,
        period.opening_time,
        period.closing_time,
        period.timeslot_minutes,
    )
}

/// Every timeslot a validated period generates, ordered by date then seqnr.
pub fn timeslot_keys(calendar_id: i64, input: &CalendarPeriodInput) -> Vec<TimeslotKey> {
    let per_day = slots_per_day(input);
    input
        .starts_at
        .iter_days()
        .take_while(|date| *date <= input.ends_at)
        .flat_map(|date| (0..per_day).map(move |seqnr| TimeslotKey::new(calendar_id, seqnr, date)))
        .collect()
}

/// Start of slot `index`, which is also where slot `index - 1` ends.
fn boundary(period: &CalendarPeriod, index: u32) -> NaiveTime {
    if !period.reservable {
        return if index == 0 {
            period.opening_time
        } else {
            period.closing_time
        };
    }
    let offset = i64::from(period.timeslot_minutes) * i64::from(index);
    period.opening_time + Duration::minutes(offset)
}

/// Wall-clock time at which timeslot `seqnr` of `period` begins, or `None`
/// when the period has no such timeslot.
pub fn timeslot_start(period: &CalendarPeriod, seqnr: u32) -> Option<NaiveTime> {
    (seqnr < period_slots_per_day(period)).then(|| boundary(period, seqnr))
}

pub fn timeslot_end(period: &CalendarPeriod, seqnr: u32) -> Option<NaiveTime> {
    (seqnr < period_slots_per_day(period)).then(|| boundary(period, seqnr + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn input() -> CalendarPeriodInput {
        CalendarPeriodInput {
            location_id: 1,
            starts_at: date(6),
            ends_at: date(8),
            opening_time: time(9, 0),
            closing_time: time(17, 0),
            reservable_from: Utc::now(),
            reservable: true,
            timeslot_minutes: 240,
            seat_count: 20,
        }
    }

    fn period(input: &CalendarPeriodInput) -> CalendarPeriod {
        CalendarPeriod {
            id: 3,
            location_id: input.location_id,
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            opening_time: input.opening_time,
            closing_time: input.closing_time,
            reservable_from: input.reservable_from,
            reservable: input.reservable,
            timeslot_minutes: input.timeslot_minutes,
            seat_count: input.seat_count,
        }
    }

    #[test]
    fn generates_slots_for_every_day() {
        let keys = timeslot_keys(3, &input());
        assert_eq!(keys.len(), 6);
        assert_eq!(keys[0], TimeslotKey::new(3, 0, date(6)));
        assert_eq!(keys[1], TimeslotKey::new(3, 1, date(6)));
        assert_eq!(keys[5], TimeslotKey::new(3, 1, date(8)));
    }

    #[test]
    fn trailing_remainder_is_dropped() {
        let mut input = input();
        input.timeslot_minutes = 180;
        assert_eq!(timeslot_keys(3, &input).len(), 6);
    }

    #[test]
    fn non_reservable_period_has_one_slot_per_day() {
        let mut input = input();
        input.reservable = false;
        input.timeslot_minutes = 0;
        assert!(validate_period(&input).is_ok());

        let keys = timeslot_keys(3, &input);
        assert_eq!(keys.len(), 3);
        assert!(keys.iter().all(|k| k.seqnr == 0));
        assert_eq!(timeslot_end(&period(&input), 0), Some(time(17, 0)));
        assert_eq!(timeslot_start(&period(&input), 1), None);
    }

    #[test]
    fn slot_bounds_follow_sequence_number() {
        let p = period(&input());
        assert_eq!(timeslot_start(&p, 0), Some(time(9, 0)));
        assert_eq!(timeslot_end(&p, 0), Some(time(13, 0)));
        assert_eq!(timeslot_start(&p, 1), Some(time(13, 0)));
        assert_eq!(timeslot_end(&p, 1), Some(time(17, 0)));
    }

    #[test]
    fn sequence_numbers_past_closing_have_no_bounds() {
        let p = period(&input());
        assert_eq!(period_slots_per_day(&p), 2);
        assert_eq!(timeslot_start(&p, 2), None);
        assert_eq!(timeslot_end(&p, 2), None);
        // Would wrap past midnight several times over if computed blindly.
        assert_eq!(timeslot_start(&p, u32::MAX), None);
    }

    #[test]
    fn invalid_periods_are_rejected() {
        let mut reversed = input();
        reversed.ends_at = date(5);
        assert_eq!(validate_period(&reversed), Err(CalendarError::EndsBeforeStart));

        let mut closed = input();
        closed.closing_time = time(9, 0);
        assert_eq!(
            validate_period(&closed),
            Err(CalendarError::ClosingNotAfterOpening)
        );

        let mut zero = input();
        zero.timeslot_minutes = 0;
        assert_eq!(validate_period(&zero), Err(CalendarError::ZeroTimeslotLength));

        let mut too_long = input();
        too_long.timeslot_minutes = 600;
        assert_eq!(
            validate_period(&too_long),
            Err(CalendarError::TimeslotLongerThanOpeningHours(600))
        );

        let mut seatless = input();
        seatless.seat_count = 0;
        assert_eq!(validate_period(&seatless), Err(CalendarError::NoSeats));
        seatless.reservable = false;
        assert!(validate_period(&seatless).is_ok());
    }
}
