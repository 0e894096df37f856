//! Nutrition entry repository contract and SQLite implementation.
//!
//! # Invariants
//! - Entries of one date are listed newest time first.
//! - Range listings are chronological (date, then time).

use crate::model::nutrition::{Nutrients, NutritionEntry};
use crate::model::RecordId;
use crate::repo::codec::{bool_col, bool_to_int, date_col, date_to_db, time_col, time_to_db, uuid_col};
use crate::repo::{RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

const ENTRY_SELECT_SQL: &str = "SELECT
    id,
    date,
    time,
    description,
    calories,
    protein,
    carbs,
    fat,
    fiber,
    sugar,
    salt,
    water,
    ai_estimated
FROM nutrition_entries";

pub trait NutritionRepository {
    fn create_entry(&self, entry: &NutritionEntry) -> RepoResult<RecordId>;
    fn update_entry(&self, entry: &NutritionEntry) -> RepoResult<()>;
    fn get_entry(&self, id: RecordId) -> RepoResult<Option<NutritionEntry>>;
    fn delete_entry(&self, id: RecordId) -> RepoResult<()>;
    fn list_by_date(&self, date: NaiveDate) -> RepoResult<Vec<NutritionEntry>>;
    /// Inclusive on both ends.
    fn list_range(&self, start: NaiveDate, end: NaiveDate) -> RepoResult<Vec<NutritionEntry>>;
}

impl<T: NutritionRepository + ?Sized> NutritionRepository for &T {
    fn create_entry(&self, entry: &NutritionEntry) -> RepoResult<RecordId> {
        (**self).create_entry(entry)
    }

    fn update_entry(&self, entry: &NutritionEntry) -> RepoResult<()> {
        (**self).update_entry(entry)
    }

    fn get_entry(&self, id: RecordId) -> RepoResult<Option<NutritionEntry>> {
        (**self).get_entry(id)
    }

    fn delete_entry(&self, id: RecordId) -> RepoResult<()> {
        (**self).delete_entry(id)
    }

    fn list_by_date(&self, date: NaiveDate) -> RepoResult<Vec<NutritionEntry>> {
        (**self).list_by_date(date)
    }

    fn list_range(&self, start: NaiveDate, end: NaiveDate) -> RepoResult<Vec<NutritionEntry>> {
        (**self).list_range(start, end)
    }
}

pub struct SqliteNutritionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNutritionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<NutritionEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }
        Ok(entries)
    }
}

impl NutritionRepository for SqliteNutritionRepository<'_> {
    fn create_entry(&self, entry: &NutritionEntry) -> RepoResult<RecordId> {
        entry.validate()?;
        let n = &entry.nutrients;

        self.conn.execute(
            "INSERT INTO nutrition_entries (
                id,
                date,
                time,
                description,
                calories,
                protein,
                carbs,
                fat,
                fiber,
                sugar,
                salt,
                water,
                ai_estimated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
            params![
                entry.id.to_string(),
                date_to_db(entry.date),
                time_to_db(entry.time),
                entry.description.as_str(),
                n.calories,
                n.protein,
                n.carbs,
                n.fat,
                n.fiber,
                n.sugar,
                n.salt,
                n.water,
                bool_to_int(entry.ai_estimated),
            ],
        )?;

        Ok(entry.id)
    }

    fn update_entry(&self, entry: &NutritionEntry) -> RepoResult<()> {
        entry.validate()?;
        let n = &entry.nutrients;

        let changed = self.conn.execute(
            "UPDATE nutrition_entries
             SET
                date = ?1,
                time = ?2,
                description = ?3,
                calories = ?4,
                protein = ?5,
                carbs = ?6,
                fat = ?7,
                fiber = ?8,
                sugar = ?9,
                salt = ?10,
                water = ?11,
                ai_estimated = ?12
             WHERE id = ?13;",
            params![
                date_to_db(entry.date),
                time_to_db(entry.time),
                entry.description.as_str(),
                n.calories,
                n.protein,
                n.carbs,
                n.fat,
                n.fiber,
                n.sugar,
                n.salt,
                n.water,
                bool_to_int(entry.ai_estimated),
                entry.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("nutrition entry", entry.id));
        }
        Ok(())
    }

    fn get_entry(&self, id: RecordId) -> RepoResult<Option<NutritionEntry>> {
        let mut entries = self.query(
            &format!("{ENTRY_SELECT_SQL} WHERE id = ?1;"),
            [id.to_string()],
        )?;
        Ok(entries.pop())
    }

    fn delete_entry(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM nutrition_entries WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("nutrition entry", id));
        }
        Ok(())
    }

    fn list_by_date(&self, date: NaiveDate) -> RepoResult<Vec<NutritionEntry>> {
        self.query(
            &format!("{ENTRY_SELECT_SQL} WHERE date = ?1 ORDER BY time DESC, created_at DESC;"),
            [date_to_db(date)],
        )
    }

    fn list_range(&self, start: NaiveDate, end: NaiveDate) -> RepoResult<Vec<NutritionEntry>> {
        self.query(
            &format!(
                "{ENTRY_SELECT_SQL}
                 WHERE date >= ?1 AND date <= ?2
                 ORDER BY date ASC, time ASC;"
            ),
            [date_to_db(start), date_to_db(end)],
        )
    }
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<NutritionEntry> {
    const TABLE: &str = "nutrition_entries";
    let entry = NutritionEntry {
        id: uuid_col(row, TABLE, "id")?,
        date: date_col(row, TABLE, "date")?,
        time: time_col(row, TABLE, "time")?,
        description: row.get("description")?,
        nutrients: Nutrients {
            calories: row.get("calories")?,
            protein: row.get("protein")?,
            carbs: row.get("carbs")?,
            fat: row.get("fat")?,
            fiber: row.get("fiber")?,
            sugar: row.get("sugar")?,
            salt: row.get("salt")?,
            water: row.get("water")?,
        },
        ai_estimated: bool_col(row, TABLE, "ai_estimated")?,
    };
    entry.validate()?;
    Ok(entry)
}
