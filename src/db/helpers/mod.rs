use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::db::models::{TimeslotKey, TokenPurpose};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S%.f";

pub fn to_i64(value: u32) -> i64 {
    i64::from(value)
}

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} contains out-of-range value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).with_context(|| format!("failed to parse {field}"))
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub fn parse_time(value: &str, field: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, TIME_FORMAT).with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_purpose(value: Option<String>) -> Result<Option<TokenPurpose>> {
    value.map(|raw| raw.parse::<TokenPurpose>()).transpose()
}

pub fn parse_flag(value: i64, field: &str) -> Result<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(anyhow!("{field} contains non-boolean value {other}")),
    }
}

/// Timeslot identity as read from `calendar_id, seqnr, timeslot_date` columns.
pub fn timeslot_key(calendar_id: i64, seqnr: i64, date: &str) -> Result<TimeslotKey> {
    Ok(TimeslotKey::new(
        calendar_id,
        to_u32(seqnr, "seqnr")?,
        parse_date(date, "timeslot_date")?,
    ))
}
