//! Column codecs shared by the SQLite repositories.
//!
//! Every parse helper names `table.column` in its error so a corrupt row can
//! be located without logging its content.

use crate::model::calendar::{format_date, format_time, parse_date, parse_time};
use crate::repo::{RepoError, RepoResult};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub(crate) fn uuid_col(row: &Row<'_>, table: &str, column: &str) -> RepoResult<Uuid> {
    let value: String = row.get(column)?;
    Uuid::parse_str(&value).map_err(|_| invalid(table, column, &value))
}

pub(crate) fn date_col(row: &Row<'_>, table: &str, column: &str) -> RepoResult<NaiveDate> {
    let value: String = row.get(column)?;
    parse_date(&value).ok_or_else(|| invalid(table, column, &value))
}

pub(crate) fn optional_date_col(
    row: &Row<'_>,
    table: &str,
    column: &str,
) -> RepoResult<Option<NaiveDate>> {
    match row.get::<_, Option<String>>(column)? {
        Some(value) => parse_date(&value)
            .map(Some)
            .ok_or_else(|| invalid(table, column, &value)),
        None => Ok(None),
    }
}

pub(crate) fn time_col(row: &Row<'_>, table: &str, column: &str) -> RepoResult<NaiveTime> {
    let value: String = row.get(column)?;
    parse_time(&value).ok_or_else(|| invalid(table, column, &value))
}

pub(crate) fn optional_time_col(
    row: &Row<'_>,
    table: &str,
    column: &str,
) -> RepoResult<Option<NaiveTime>> {
    match row.get::<_, Option<String>>(column)? {
        Some(value) => parse_time(&value)
            .map(Some)
            .ok_or_else(|| invalid(table, column, &value)),
        None => Ok(None),
    }
}

pub(crate) fn datetime_col(row: &Row<'_>, table: &str, column: &str) -> RepoResult<NaiveDateTime> {
    let value: String = row.get(column)?;
    parse_datetime(&value).ok_or_else(|| invalid(table, column, &value))
}

pub(crate) fn optional_datetime_col(
    row: &Row<'_>,
    table: &str,
    column: &str,
) -> RepoResult<Option<NaiveDateTime>> {
    match row.get::<_, Option<String>>(column)? {
        Some(value) => parse_datetime(&value)
            .map(Some)
            .ok_or_else(|| invalid(table, column, &value)),
        None => Ok(None),
    }
}

pub(crate) fn bool_col(row: &Row<'_>, table: &str, column: &str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(invalid(table, column, &other.to_string())),
    }
}

pub(crate) fn json_col<T: DeserializeOwned>(
    row: &Row<'_>,
    table: &str,
    column: &str,
) -> RepoResult<T> {
    let value: String = row.get(column)?;
    serde_json::from_str(&value).map_err(|err| {
        RepoError::InvalidData(format!("invalid json in {table}.{column}: {err}"))
    })
}

/// Parses a stored enum label through `parse`.
pub(crate) fn enum_col<T>(
    row: &Row<'_>,
    table: &str,
    column: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> RepoResult<T> {
    let value: String = row.get(column)?;
    parse(&value).ok_or_else(|| invalid(table, column, &value))
}

pub(crate) fn optional_enum_col<T>(
    row: &Row<'_>,
    table: &str,
    column: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> RepoResult<Option<T>> {
    match row.get::<_, Option<String>>(column)? {
        Some(value) => parse(&value)
            .map(Some)
            .ok_or_else(|| invalid(table, column, &value)),
        None => Ok(None),
    }
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode json column: {err}")))
}

pub(crate) fn date_to_db(date: NaiveDate) -> String {
    format_date(date)
}

pub(crate) fn time_to_db(time: NaiveTime) -> String {
    format_time(time)
}

pub(crate) fn datetime_to_db(value: NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), DATETIME_FORMAT).ok()
}

fn invalid(table: &str, column: &str, value: &str) -> RepoError {
    RepoError::InvalidData(format!("invalid value `{value}` in {table}.{column}"))
}
