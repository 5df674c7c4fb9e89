use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_i64, to_u32},
    models::{Location, LocationInput},
};

fn row_to_location(row: &Row) -> Result<Location> {
    let number_of_seats: i64 = row.get("number_of_seats")?;
    let created_at: String = row.get("created_at")?;

    Ok(Location {
        id: row.get("id")?,
        name: row.get("name")?,
        number_of_seats: to_u32(number_of_seats, "number_of_seats")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Create a location. Names are unique.
    pub async fn create_location(&self, input: LocationInput) -> Result<Location> {
        self.execute(move |conn| {
            let name = input.name.trim().to_string();
            if name.is_empty() {
                return Err(anyhow!("Location name must not be empty"));
            }

            let now = Utc::now();
            conn.execute(
                "INSERT INTO locations (name, number_of_seats, created_at)
                 VALUES (?1, ?2, ?3)",
                params![name, to_i64(input.number_of_seats), now.to_rfc3339()],
            )?;

            Ok(Location {
                id: conn.last_insert_rowid(),
                name,
                number_of_seats: input.number_of_seats,
                created_at: now,
            })
        })
        .await
    }

    pub async fn get_location(&self, location_id: i64) -> Result<Option<Location>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, number_of_seats, created_at
                 FROM locations
                 WHERE id = ?1",
            )?;

            let location = stmt
                .query_row(params![location_id], |row| Ok(row_to_location(row)))
                .optional()?
                .transpose()?;
            Ok(location)
        })
        .await
    }

    pub async fn list_locations(&self) -> Result<Vec<Location>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, number_of_seats, created_at
                 FROM locations
                 ORDER BY name ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut locations = Vec::new();
            while let Some(row) = rows.next()? {
                locations.push(row_to_location(row)?);
            }

            Ok(locations)
        })
        .await
    }
}
