use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{format_date, parse_datetime, parse_date, parse_flag, to_i64, to_u32},
    models::{Penalty, PenaltyEvent, PenaltyInput, TimeslotKey},
};

const PENALTY_COLUMNS: &str = "SELECT id, user_id, event_code, created_at, reservation_date,
        location_id, received_points, remarks
     FROM penalties";

fn row_to_penalty(row: &Row) -> Result<Penalty> {
    let event_code: i64 = row.get("event_code")?;
    let created_at: String = row.get("created_at")?;
    let reservation_date: Option<String> = row.get("reservation_date")?;
    let received_points: i64 = row.get("received_points")?;

    Ok(Penalty {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        event_code: to_u32(event_code, "event_code")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        reservation_date: reservation_date
            .map(|raw| parse_date(&raw, "reservation_date"))
            .transpose()?,
        location_id: row.get("location_id")?,
        received_points: to_u32(received_points, "received_points")?,
        remarks: row.get("remarks")?,
    })
}

fn load_descriptions(conn: &Connection, code: u32) -> Result<BTreeMap<String, String>> {
    let mut stmt = conn.prepare(
        "SELECT language, description
         FROM penalty_descriptions
         WHERE event_code = ?1",
    )?;
    let mut rows = stmt.query(params![to_i64(code)])?;
    let mut descriptions = BTreeMap::new();
    while let Some(row) = rows.next()? {
        descriptions.insert(row.get(0)?, row.get(1)?);
    }
    Ok(descriptions)
}

fn find_event(conn: &Connection, code: u32) -> Result<Option<PenaltyEvent>> {
    let row: Option<(i64, i64)> = conn
        .query_row(
            "SELECT points, public_accessible FROM penalty_events WHERE code = ?1",
            params![to_i64(code)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((points, public_accessible)) = row else {
        return Ok(None);
    };

    Ok(Some(PenaltyEvent {
        code,
        points: to_u32(points, "points")?,
        public_accessible: parse_flag(public_accessible, "public_accessible")?,
        descriptions: load_descriptions(conn, code)?,
    }))
}

/// Insert a penalty, taking the event's default points when none are given.
fn insert_penalty(conn: &Connection, input: PenaltyInput, now: DateTime<Utc>) -> Result<Penalty> {
    let event = find_event(conn, input.event_code)?
        .ok_or_else(|| anyhow!("Penalty event {} not found", input.event_code))?;
    let received_points = input.received_points.unwrap_or(event.points);

    conn.execute(
        "INSERT INTO penalties (user_id, event_code, created_at, reservation_date,
             location_id, received_points, remarks)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            input.user_id,
            to_i64(input.event_code),
            now.to_rfc3339(),
            input.reservation_date.map(format_date),
            input.location_id,
            to_i64(received_points),
            input.remarks,
        ],
    )?;

    Ok(Penalty {
        id: conn.last_insert_rowid(),
        user_id: input.user_id,
        event_code: input.event_code,
        created_at: now,
        reservation_date: input.reservation_date,
        location_id: input.location_id,
        received_points,
        remarks: input.remarks,
    })
}

impl Database {
    /// Register a penalty event together with its descriptions.
    pub async fn add_penalty_event(&self, event: PenaltyEvent) -> Result<()> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            if find_event(&tx, event.code)?.is_some() {
                return Err(anyhow!("Penalty event {} already exists", event.code));
            }

            tx.execute(
                "INSERT INTO penalty_events (code, points, public_accessible)
                 VALUES (?1, ?2, ?3)",
                params![to_i64(event.code), to_i64(event.points), event.public_accessible],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO penalty_descriptions (event_code, language, description)
                     VALUES (?1, ?2, ?3)",
                )?;
                for (language, description) in &event.descriptions {
                    stmt.execute(params![to_i64(event.code), language, description])?;
                }
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn get_penalty_event(&self, code: u32) -> Result<Option<PenaltyEvent>> {
        self.execute(move |conn| find_event(conn, code)).await
    }

    pub async fn list_penalty_events(&self) -> Result<Vec<PenaltyEvent>> {
        self.execute(|conn| {
            let codes: Vec<i64> = {
                let mut stmt = conn.prepare("SELECT code FROM penalty_events ORDER BY code ASC")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<_>>()?
            };

            let mut events = Vec::with_capacity(codes.len());
            for code in codes {
                if let Some(event) = find_event(conn, to_u32(code, "code")?)? {
                    events.push(event);
                }
            }
            Ok(events)
        })
        .await
    }

    /// Remove a penalty event and its descriptions. Fails while penalties
    /// in the book still refer to it.
    pub async fn delete_penalty_event(&self, code: u32) -> Result<()> {
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "DELETE FROM penalty_events WHERE code = ?1",
                params![to_i64(code)],
            )?;
            if rows_affected == 0 {
                return Err(anyhow!("Penalty event {code} not found"));
            }
            Ok(())
        })
        .await
    }

    pub async fn add_penalty(&self, input: PenaltyInput, now: DateTime<Utc>) -> Result<Penalty> {
        self.execute(move |conn| insert_penalty(conn, input, now))
            .await
    }

    pub async fn list_penalties_for_user(&self, user_id: &str) -> Result<Vec<Penalty>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let query = format!(
                "{PENALTY_COLUMNS}
                 WHERE user_id = ?1
                 ORDER BY created_at ASC, id ASC"
            );
            let mut stmt = conn.prepare(&query)?;

            let mut rows = stmt.query(params![user_id])?;
            let mut penalties = Vec::new();
            while let Some(row) = rows.next()? {
                penalties.push(row_to_penalty(row)?);
            }

            Ok(penalties)
        })
        .await
    }

    pub async fn delete_penalty(&self, penalty_id: i64) -> Result<()> {
        self.execute(move |conn| {
            let rows_affected =
                conn.execute("DELETE FROM penalties WHERE id = ?1", params![penalty_id])?;
            if rows_affected == 0 {
                return Err(anyhow!("Penalty {penalty_id} not found"));
            }
            Ok(())
        })
        .await
    }

    /// Sum of the points a user received over the whole penalty book.
    pub async fn total_penalty_points(&self, user_id: &str) -> Result<u32> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let total: i64 = conn.query_row(
                "SELECT COALESCE(SUM(received_points), 0) FROM penalties WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            to_u32(total, "total_points")
        })
        .await
    }

    /// Mark a reservation as not attended and book a no-show penalty for it.
    ///
    /// A user gets at most one no-show penalty per location and day; a
    /// repeated call returns the penalty already booked.
    pub async fn record_no_show(
        &self,
        user_id: &str,
        key: TimeslotKey,
        now: DateTime<Utc>,
    ) -> Result<Penalty> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let rows_affected = tx.execute(
                "UPDATE location_reservations
                 SET attended = 0
                 WHERE user_id = ?1 AND calendar_id = ?2 AND seqnr = ?3 AND timeslot_date = ?4",
                params![
                    user_id,
                    key.calendar_id,
                    to_i64(key.seqnr),
                    format_date(key.date)
                ],
            )?;
            if rows_affected == 0 {
                return Err(anyhow!("Reservation not found"));
            }

            let location_id: i64 = tx.query_row(
                "SELECT location_id FROM calendar_periods WHERE id = ?1",
                params![key.calendar_id],
                |row| row.get(0),
            )?;

            let existing = {
                let query = format!(
                    "{PENALTY_COLUMNS}
                     WHERE user_id = ?1 AND event_code = ?2
                       AND reservation_date = ?3 AND location_id = ?4"
                );
                let mut stmt = tx.prepare(&query)?;
                stmt.query_row(
                    params![
                        user_id,
                        to_i64(PenaltyEvent::NO_SHOW),
                        format_date(key.date),
                        location_id
                    ],
                    |row| Ok(row_to_penalty(row)),
                )
                .optional()?
                .transpose()?
            };

            let penalty = match existing {
                Some(penalty) => penalty,
                None => insert_penalty(
                    &tx,
                    PenaltyInput {
                        user_id,
                        event_code: PenaltyEvent::NO_SHOW,
                        reservation_date: Some(key.date),
                        location_id: Some(location_id),
                        received_points: None,
                        remarks: None,
                    },
                    now,
                )?,
            };

            tx.commit()?;
            Ok(penalty)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{CalendarPeriodInput, LocationInput, LocationReservation};
    use chrono::{Duration, NaiveDate, NaiveTime};

    fn no_show_event() -> PenaltyEvent {
        PenaltyEvent {
            code: PenaltyEvent::NO_SHOW,
            points: 30,
            public_accessible: true,
            descriptions: BTreeMap::from([
                ("en".to_string(), "Did not show up".to_string()),
                ("nl".to_string(), "Niet komen opdagen".to_string()),
            ]),
        }
    }

    fn manual(user_id: &str, points: Option<u32>) -> PenaltyInput {
        PenaltyInput {
            user_id: user_id.into(),
            event_code: PenaltyEvent::MANUAL_ENTRY,
            reservation_date: None,
            location_id: None,
            received_points: points,
            remarks: Some("disturbing others".into()),
        }
    }

    async fn with_events() -> Database {
        let db = Database::in_memory().unwrap();
        db.add_penalty_event(no_show_event()).await.unwrap();
        db.add_penalty_event(PenaltyEvent {
            code: PenaltyEvent::MANUAL_ENTRY,
            points: 10,
            public_accessible: false,
            descriptions: BTreeMap::new(),
        })
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn events_round_trip_with_descriptions() {
        let db = with_events().await;

        let event = db.get_penalty_event(PenaltyEvent::NO_SHOW).await.unwrap();
        assert_eq!(event, Some(no_show_event()));

        let codes: Vec<u32> = db
            .list_penalty_events()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.code)
            .collect();
        assert_eq!(codes, vec![PenaltyEvent::NO_SHOW, PenaltyEvent::MANUAL_ENTRY]);

        assert!(db.add_penalty_event(no_show_event()).await.is_err());
    }

    #[tokio::test]
    async fn points_default_to_the_event() {
        let db = with_events().await;

        let defaulted = db.add_penalty(manual("u1", None), Utc::now()).await.unwrap();
        assert_eq!(defaulted.received_points, 10);
        let explicit = db.add_penalty(manual("u1", Some(4)), Utc::now()).await.unwrap();
        assert_eq!(explicit.received_points, 4);
        db.add_penalty(manual("u2", Some(50)), Utc::now()).await.unwrap();

        assert_eq!(
            db.list_penalties_for_user("u1").await.unwrap(),
            vec![defaulted.clone(), explicit]
        );
        assert_eq!(db.total_penalty_points("u1").await.unwrap(), 14);
        assert_eq!(db.total_penalty_points("nobody").await.unwrap(), 0);

        db.delete_penalty(defaulted.id).await.unwrap();
        assert_eq!(db.total_penalty_points("u1").await.unwrap(), 4);
        assert!(db.delete_penalty(defaulted.id).await.is_err());
    }

    #[tokio::test]
    async fn unknown_event_is_rejected() {
        let db = Database::in_memory().unwrap();
        assert!(db.add_penalty(manual("u1", None), Utc::now()).await.is_err());
        assert!(db.list_penalties_for_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn event_in_use_cannot_be_deleted() {
        let db = with_events().await;
        db.add_penalty(manual("u1", None), Utc::now()).await.unwrap();

        assert!(db.delete_penalty_event(PenaltyEvent::MANUAL_ENTRY).await.is_err());
        db.delete_penalty_event(PenaltyEvent::NO_SHOW).await.unwrap();
        assert_eq!(db.get_penalty_event(PenaltyEvent::NO_SHOW).await.unwrap(), None);
    }

    #[tokio::test]
    async fn no_show_marks_attendance_and_books_once() {
        let db = with_events().await;
        let location = db
            .create_location(LocationInput {
                name: "Therminal".into(),
                number_of_seats: 10,
            })
            .await
            .unwrap();
        db.create_calendar_period(CalendarPeriodInput {
            location_id: location.id,
            starts_at: NaiveDate::from_ymd_opt(2024, 10, 7).unwrap(),
            ends_at: NaiveDate::from_ymd_opt(2024, 10, 7).unwrap(),
            opening_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            closing_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            reservable_from: Utc::now() - Duration::days(1),
            reservable: true,
            timeslot_minutes: 240,
            seat_count: 10,
        })
        .await
        .unwrap();
        let keys: Vec<TimeslotKey> = db
            .list_timeslots_for_location(location.id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.key)
            .collect();
        db.add_reservations(
            keys.iter().map(|k| LocationReservation::new("u1", *k)).collect(),
            Utc::now(),
        )
        .await
        .unwrap();

        let first = db.record_no_show("u1", keys[0], Utc::now()).await.unwrap();
        assert_eq!(first.event_code, PenaltyEvent::NO_SHOW);
        assert_eq!(first.received_points, 30);
        assert_eq!(first.location_id, Some(location.id));
        assert_eq!(first.reservation_date, Some(keys[0].date));

        let again = db.record_no_show("u1", keys[1], Utc::now()).await.unwrap();
        assert_eq!(again, first);
        assert_eq!(db.total_penalty_points("u1").await.unwrap(), 30);

        let reservations = db.list_reservations_for_user("u1", None).await.unwrap();
        assert!(reservations.iter().all(|r| r.attended == Some(false)));

        assert!(db.record_no_show("u2", keys[0], Utc::now()).await.is_err());
    }
}
