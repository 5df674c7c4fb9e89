use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};

use super::calendar_periods::find_timeslot;
use crate::db::{
    connection::Database,
    helpers::{format_date, parse_date, parse_datetime, parse_flag, timeslot_key, to_i64, to_u32},
    models::{LocationReservation, TimeslotKey},
};
use crate::reservations::ReservationError;

fn row_to_reservation(row: &Row) -> Result<LocationReservation> {
    let calendar_id: i64 = row.get("calendar_id")?;
    let seqnr: i64 = row.get("seqnr")?;
    let date: String = row.get("timeslot_date")?;
    let created_at: String = row.get("created_at")?;
    let attended: Option<i64> = row.get("attended")?;

    Ok(LocationReservation {
        user_id: row.get("user_id")?,
        timeslot: timeslot_key(calendar_id, seqnr, &date)?,
        created_at: parse_datetime(&created_at, "created_at")?,
        attended: attended.map(|v| parse_flag(v, "attended")).transpose()?,
    })
}

/// Row-level reservation access. Callers decide the transaction boundary.
pub(crate) struct ReservationRepository<'a> {
    conn: &'a Connection,
}

impl<'a> ReservationRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn holds(&self, user_id: &str, key: &TimeslotKey) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM location_reservations
             WHERE user_id = ?1 AND calendar_id = ?2 AND seqnr = ?3 AND timeslot_date = ?4",
            params![user_id, key.calendar_id, to_i64(key.seqnr), format_date(key.date)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert a reservation after checking the timeslot exists, is open for
    /// reservations at `now` and still has a free seat. Re-inserting a
    /// reservation the user already holds is a no-op.
    pub fn insert(&self, reservation: &LocationReservation, now: DateTime<Utc>) -> Result<()> {
        let key = reservation.timeslot;
        if self.holds(&reservation.user_id, &key)? {
            return Ok(());
        }

        let row = find_timeslot(self.conn, &key)?
            .ok_or(ReservationError::UnknownTimeslot(key))?;
        if !row.reservable {
            return Err(ReservationError::NotReservable(key).into());
        }
        if !row.timeslot.is_reservable_at(now) {
            return Err(ReservationError::NotReservableYet(key).into());
        }
        if row.timeslot.is_full() {
            return Err(ReservationError::SlotFull(key).into());
        }

        self.conn.execute(
            "INSERT INTO location_reservations (user_id, calendar_id, seqnr, timeslot_date, created_at, attended)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                reservation.user_id,
                key.calendar_id,
                to_i64(key.seqnr),
                format_date(key.date),
                reservation.created_at.to_rfc3339(),
                reservation.attended,
            ],
        )?;
        Ok(())
    }

    pub fn delete(&self, reservation: &LocationReservation) -> Result<usize> {
        let key = reservation.timeslot;
        let rows = self.conn.execute(
            "DELETE FROM location_reservations
             WHERE user_id = ?1 AND calendar_id = ?2 AND seqnr = ?3 AND timeslot_date = ?4",
            params![
                reservation.user_id,
                key.calendar_id,
                to_i64(key.seqnr),
                format_date(key.date),
            ],
        )?;
        Ok(rows)
    }
}

impl Database {
    /// Reservations of a user, optionally restricted to one location.
    pub async fn list_reservations_for_user(
        &self,
        user_id: &str,
        location_id: Option<i64>,
    ) -> Result<Vec<LocationReservation>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT r.user_id, r.calendar_id, r.seqnr, r.timeslot_date, r.created_at, r.attended
                 FROM location_reservations r
                 JOIN calendar_periods p ON p.id = r.calendar_id
                 WHERE r.user_id = ?1 AND (?2 IS NULL OR p.location_id = ?2)
                 ORDER BY r.timeslot_date ASC, r.calendar_id ASC, r.seqnr ASC",
            )?;

            let mut rows = stmt.query(params![user_id, location_id])?;
            let mut reservations = Vec::new();
            while let Some(row) = rows.next()? {
                reservations.push(row_to_reservation(row)?);
            }

            Ok(reservations)
        })
        .await
    }

    pub async fn list_reservations_for_timeslot(
        &self,
        key: TimeslotKey,
    ) -> Result<Vec<LocationReservation>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, calendar_id, seqnr, timeslot_date, created_at, attended
                 FROM location_reservations
                 WHERE calendar_id = ?1 AND seqnr = ?2 AND timeslot_date = ?3
                 ORDER BY created_at ASC, user_id ASC",
            )?;

            let mut rows = stmt.query(params![
                key.calendar_id,
                to_i64(key.seqnr),
                format_date(key.date)
            ])?;
            let mut reservations = Vec::new();
            while let Some(row) = rows.next()? {
                reservations.push(row_to_reservation(row)?);
            }

            Ok(reservations)
        })
        .await
    }

    /// Create a batch of reservations. Either all are stored or none.
    pub async fn add_reservations(
        &self,
        reservations: Vec<LocationReservation>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.apply_reservation_changes(reservations, Vec::new(), now)
            .await
    }

    /// Delete a batch of reservations. Missing rows are ignored.
    pub async fn delete_reservations(&self, reservations: Vec<LocationReservation>) -> Result<usize> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let mut deleted = 0;
            {
                let repo = ReservationRepository::new(&tx);
                for reservation in &reservations {
                    deleted += repo.delete(reservation)?;
                }
            }
            tx.commit()?;
            Ok(deleted)
        })
        .await
    }

    /// Apply removals and additions in a single transaction.
    ///
    /// Removals run first so a user moving between slots of a full location
    /// frees their old seat before taking the new one.
    pub async fn apply_reservation_changes(
        &self,
        to_add: Vec<LocationReservation>,
        to_remove: Vec<LocationReservation>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            {
                let repo = ReservationRepository::new(&tx);
                for reservation in &to_remove {
                    repo.delete(reservation)?;
                }
                for reservation in &to_add {
                    repo.insert(reservation, now)?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn set_reservation_attendance(
        &self,
        user_id: &str,
        key: TimeslotKey,
        attended: bool,
    ) -> Result<()> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE location_reservations
                 SET attended = ?1
                 WHERE user_id = ?2 AND calendar_id = ?3 AND seqnr = ?4 AND timeslot_date = ?5",
                params![
                    attended,
                    user_id,
                    key.calendar_id,
                    to_i64(key.seqnr),
                    format_date(key.date)
                ],
            )?;

            if rows_affected == 0 {
                return Err(anyhow!("Reservation not found"));
            }
            Ok(())
        })
        .await
    }

    /// Number of reservations per day at a location.
    pub async fn reservation_counts_for_location(
        &self,
        location_id: i64,
    ) -> Result<BTreeMap<NaiveDate, u32>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT r.timeslot_date, COUNT(*)
                 FROM location_reservations r
                 JOIN calendar_periods p ON p.id = r.calendar_id
                 WHERE p.location_id = ?1
                 GROUP BY r.timeslot_date",
            )?;

            let mut rows = stmt.query(params![location_id])?;
            let mut counts = BTreeMap::new();
            while let Some(row) = rows.next()? {
                let date: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                counts.insert(
                    parse_date(&date, "timeslot_date")?,
                    to_u32(count, "count")?,
                );
            }

            Ok(counts)
        })
        .await
    }
}
