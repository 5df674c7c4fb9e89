use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::calendar::{timeslot_keys, validate_period};
use crate::db::{
    connection::Database,
    helpers::{
        format_date, format_time, parse_date, parse_datetime, parse_flag, parse_time,
        timeslot_key, to_i64, to_u32,
    },
    models::{CalendarPeriod, CalendarPeriodInput, Timeslot, TimeslotKey},
};

const TIMESLOT_COLUMNS: &str = "SELECT t.calendar_id, t.seqnr, t.timeslot_date, t.seat_count,
        p.location_id, p.reservable_from, p.reservable,
        (SELECT COUNT(*) FROM location_reservations r
          WHERE r.calendar_id = t.calendar_id
            AND r.seqnr = t.seqnr
            AND r.timeslot_date = t.timeslot_date) AS amount_of_reservations
     FROM timeslots t
     JOIN calendar_periods p ON p.id = t.calendar_id";

fn row_to_period(row: &Row) -> Result<CalendarPeriod> {
    let starts_at: String = row.get("starts_at")?;
    let ends_at: String = row.get("ends_at")?;
    let opening_time: String = row.get("opening_time")?;
    let closing_time: String = row.get("closing_time")?;
    let reservable_from: String = row.get("reservable_from")?;
    let reservable: i64 = row.get("reservable")?;
    let timeslot_minutes: i64 = row.get("timeslot_minutes")?;
    let seat_count: i64 = row.get("seat_count")?;

    Ok(CalendarPeriod {
        id: row.get("id")?,
        location_id: row.get("location_id")?,
        starts_at: parse_date(&starts_at, "starts_at")?,
        ends_at: parse_date(&ends_at, "ends_at")?,
        opening_time: parse_time(&opening_time, "opening_time")?,
        closing_time: parse_time(&closing_time, "closing_time")?,
        reservable_from: parse_datetime(&reservable_from, "reservable_from")?,
        reservable: parse_flag(reservable, "reservable")?,
        timeslot_minutes: to_u32(timeslot_minutes, "timeslot_minutes")?,
        seat_count: to_u32(seat_count, "seat_count")?,
    })
}

/// A timeslot row joined with its period.
pub(crate) struct TimeslotRow {
    pub timeslot: Timeslot,
    pub reservable: bool,
}

fn row_to_timeslot(row: &Row) -> Result<TimeslotRow> {
    let calendar_id: i64 = row.get("calendar_id")?;
    let seqnr: i64 = row.get("seqnr")?;
    let date: String = row.get("timeslot_date")?;
    let seat_count: i64 = row.get("seat_count")?;
    let reservable_from: String = row.get("reservable_from")?;
    let reservable: i64 = row.get("reservable")?;
    let amount: i64 = row.get("amount_of_reservations")?;

    Ok(TimeslotRow {
        timeslot: Timeslot {
            key: timeslot_key(calendar_id, seqnr, &date)?,
            location_id: row.get("location_id")?,
            seat_count: to_u32(seat_count, "seat_count")?,
            amount_of_reservations: to_u32(amount, "amount_of_reservations")?,
            reservable_from: parse_datetime(&reservable_from, "reservable_from")?,
        },
        reservable: parse_flag(reservable, "reservable")?,
    })
}

pub(crate) fn find_timeslot(conn: &Connection, key: &TimeslotKey) -> Result<Option<TimeslotRow>> {
    let query = format!(
        "{TIMESLOT_COLUMNS}
         WHERE t.calendar_id = ?1 AND t.seqnr = ?2 AND t.timeslot_date = ?3"
    );
    let mut stmt = conn.prepare(&query)?;
    let row = stmt
        .query_row(
            params![key.calendar_id, to_i64(key.seqnr), format_date(key.date)],
            |row| Ok(row_to_timeslot(row)),
        )
        .optional()?
        .transpose()?;
    Ok(row)
}

impl Database {
    /// Store a calendar period and generate its timeslots in one transaction.
    pub async fn create_calendar_period(&self, input: CalendarPeriodInput) -> Result<CalendarPeriod> {
        validate_period(&input).context("invalid calendar period")?;

        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let location_exists: Option<i64> = tx
                .query_row(
                    "SELECT id FROM locations WHERE id = ?1",
                    params![input.location_id],
                    |row| row.get(0),
                )
                .optional()?;
            if location_exists.is_none() {
                return Err(anyhow!("Location {} not found", input.location_id));
            }

            tx.execute(
                "INSERT INTO calendar_periods (location_id, starts_at, ends_at, opening_time, closing_time,
                     reservable_from, reservable, timeslot_minutes, seat_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    input.location_id,
                    format_date(input.starts_at),
                    format_date(input.ends_at),
                    format_time(input.opening_time),
                    format_time(input.closing_time),
                    input.reservable_from.to_rfc3339(),
                    input.reservable,
                    to_i64(input.timeslot_minutes),
                    to_i64(input.seat_count),
                    Utc::now().to_rfc3339(),
                ],
            )?;
            let calendar_id = tx.last_insert_rowid();

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO timeslots (calendar_id, seqnr, timeslot_date, seat_count)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for key in timeslot_keys(calendar_id, &input) {
                    stmt.execute(params![
                        calendar_id,
                        to_i64(key.seqnr),
                        format_date(key.date),
                        to_i64(input.seat_count),
                    ])?;
                }
            }

            tx.commit()?;

            Ok(CalendarPeriod {
                id: calendar_id,
                location_id: input.location_id,
                starts_at: input.starts_at,
                ends_at: input.ends_at,
                opening_time: input.opening_time,
                closing_time: input.closing_time,
                reservable_from: input.reservable_from,
                reservable: input.reservable,
                timeslot_minutes: input.timeslot_minutes,
                seat_count: input.seat_count,
            })
        })
        .await
    }

    pub async fn list_calendar_periods(&self, location_id: i64) -> Result<Vec<CalendarPeriod>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, location_id, starts_at, ends_at, opening_time, closing_time,
                        reservable_from, reservable, timeslot_minutes, seat_count
                 FROM calendar_periods
                 WHERE location_id = ?1
                 ORDER BY starts_at ASC, id ASC",
            )?;

            let mut rows = stmt.query(params![location_id])?;
            let mut periods = Vec::new();
            while let Some(row) = rows.next()? {
                periods.push(row_to_period(row)?);
            }

            Ok(periods)
        })
        .await
    }

    /// All timeslots of a location with their current reservation counts.
    pub async fn list_timeslots_for_location(&self, location_id: i64) -> Result<Vec<Timeslot>> {
        self.execute(move |conn| {
            let query = format!(
                "{TIMESLOT_COLUMNS}
                 WHERE p.location_id = ?1
                 ORDER BY t.timeslot_date ASC, t.calendar_id ASC, t.seqnr ASC"
            );
            let mut stmt = conn.prepare(&query)?;

            let mut rows = stmt.query(params![location_id])?;
            let mut timeslots = Vec::new();
            while let Some(row) = rows.next()? {
                timeslots.push(row_to_timeslot(row)?.timeslot);
            }

            Ok(timeslots)
        })
        .await
    }

    pub async fn get_timeslot(&self, key: TimeslotKey) -> Result<Option<Timeslot>> {
        self.execute(move |conn| Ok(find_timeslot(conn, &key)?.map(|row| row.timeslot)))
            .await
    }
}
