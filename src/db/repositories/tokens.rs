use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    helpers::{parse_datetime, parse_flag, parse_optional_datetime, parse_optional_purpose},
    models::{Token, TokenPurpose},
};

fn row_to_token(row: &Row) -> Result<Token> {
    let purpose: Option<String> = row.get("purpose")?;
    let is_used: i64 = row.get("is_used")?;
    let created_at: String = row.get("created_at")?;
    let used_at: Option<String> = row.get("used_at")?;

    Ok(Token {
        id: row.get("id")?,
        email: row.get("email")?,
        purpose: parse_optional_purpose(purpose)?,
        is_used: parse_flag(is_used, "is_used")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        used_at: parse_optional_datetime(used_at, "used_at")?,
    })
}

/// Row-level access to the `tokens` table. Runs on the database thread.
pub struct TokenRepository<'a> {
    conn: &'a Connection,
}

impl<'a> TokenRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert an unbound token: no email, no purpose, unused.
    pub fn insert(&self, now: DateTime<Utc>) -> Result<Token> {
        let token = Token {
            id: uuid::Uuid::new_v4().to_string(),
            email: None,
            purpose: None,
            is_used: false,
            created_at: now,
            used_at: None,
        };

        self.conn.execute(
            "INSERT INTO tokens (id, email, purpose, is_used, created_at, used_at)
             VALUES (?1, NULL, NULL, 0, ?2, NULL)",
            params![token.id, token.created_at.to_rfc3339()],
        )?;
        Ok(token)
    }

    pub fn find(&self, token_id: &str) -> Result<Option<Token>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, purpose, is_used, created_at, used_at
             FROM tokens
             WHERE id = ?1",
        )?;

        let token = stmt
            .query_row(params![token_id], |row| Ok(row_to_token(row)))
            .optional()?
            .transpose()?;
        Ok(token)
    }

    pub fn bind(&self, token_id: &str, email: Option<&str>, purpose: TokenPurpose) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE tokens
             SET purpose = ?1,
                 email = COALESCE(?2, email)
             WHERE id = ?3 AND is_used = 0",
            params![purpose.as_str(), email, token_id],
        )?;
        Ok(rows)
    }

    /// Flip `is_used`. Only an unused row is touched, so the returned count is
    /// zero when someone else consumed the token first.
    pub fn mark_used(&self, token_id: &str, used_at: DateTime<Utc>) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE tokens
             SET is_used = 1,
                 used_at = ?1
             WHERE id = ?2 AND is_used = 0",
            params![used_at.to_rfc3339(), token_id],
        )?;
        Ok(rows)
    }
}
