//! Finance repository contract and SQLite implementation.
//!
//! # Invariants
//! - Deleting a category deletes its entries.
//! - Entries reference an existing category.
//! - Categories are listed by name, entries newest date first.

use crate::model::finance::{BudgetRhythm, EntryFilter, FinanceCategory, FinanceEntry};
use crate::model::RecordId;
use crate::repo::codec::{date_col, date_to_db, enum_col, uuid_col};
use crate::repo::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const CATEGORY_SELECT_SQL: &str = "SELECT
    id,
    name,
    budget,
    rhythm,
    color
FROM finance_categories";

const ENTRY_SELECT_SQL: &str = "SELECT
    id,
    category_id,
    date,
    description,
    amount
FROM finance_entries";

pub trait FinanceRepository {
    fn list_categories(&self) -> RepoResult<Vec<FinanceCategory>>;
    fn get_category(&self, id: RecordId) -> RepoResult<Option<FinanceCategory>>;
    fn create_category(&self, category: &FinanceCategory) -> RepoResult<RecordId>;
    fn update_category(&self, category: &FinanceCategory) -> RepoResult<()>;
    /// Removes the category and all of its entries.
    fn delete_category(&self, id: RecordId) -> RepoResult<()>;
    fn list_entries(&self, filter: &EntryFilter) -> RepoResult<Vec<FinanceEntry>>;
    fn create_entry(&self, entry: &FinanceEntry) -> RepoResult<RecordId>;
    fn update_entry(&self, entry: &FinanceEntry) -> RepoResult<()>;
    fn delete_entry(&self, id: RecordId) -> RepoResult<()>;
}

impl<T: FinanceRepository + ?Sized> FinanceRepository for &T {
    fn list_categories(&self) -> RepoResult<Vec<FinanceCategory>> {
        (**self).list_categories()
    }

    fn get_category(&self, id: RecordId) -> RepoResult<Option<FinanceCategory>> {
        (**self).get_category(id)
    }

    fn create_category(&self, category: &FinanceCategory) -> RepoResult<RecordId> {
        (**self).create_category(category)
    }

    fn update_category(&self, category: &FinanceCategory) -> RepoResult<()> {
        (**self).update_category(category)
    }

    fn delete_category(&self, id: RecordId) -> RepoResult<()> {
        (**self).delete_category(id)
    }

    fn list_entries(&self, filter: &EntryFilter) -> RepoResult<Vec<FinanceEntry>> {
        (**self).list_entries(filter)
    }

    fn create_entry(&self, entry: &FinanceEntry) -> RepoResult<RecordId> {
        (**self).create_entry(entry)
    }

    fn update_entry(&self, entry: &FinanceEntry) -> RepoResult<()> {
        (**self).update_entry(entry)
    }

    fn delete_entry(&self, id: RecordId) -> RepoResult<()> {
        (**self).delete_entry(id)
    }
}

pub struct SqliteFinanceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFinanceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl FinanceRepository for SqliteFinanceRepository<'_> {
    fn list_categories(&self) -> RepoResult<Vec<FinanceCategory>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CATEGORY_SELECT_SQL} ORDER BY name COLLATE NOCASE ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next()? {
            categories.push(parse_category_row(row)?);
        }
        Ok(categories)
    }

    fn get_category(&self, id: RecordId) -> RepoResult<Option<FinanceCategory>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CATEGORY_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_category_row(row)?)),
            None => Ok(None),
        }
    }

    fn create_category(&self, category: &FinanceCategory) -> RepoResult<RecordId> {
        category.validate()?;
        self.conn.execute(
            "INSERT INTO finance_categories (id, name, budget, rhythm, color)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                category.id.to_string(),
                category.name.as_str(),
                category.budget,
                category.rhythm.as_str(),
                category.color.as_str(),
            ],
        )?;
        Ok(category.id)
    }

    fn update_category(&self, category: &FinanceCategory) -> RepoResult<()> {
        category.validate()?;
        let changed = self.conn.execute(
            "UPDATE finance_categories
             SET name = ?1, budget = ?2, rhythm = ?3, color = ?4
             WHERE id = ?5;",
            params![
                category.name.as_str(),
                category.budget,
                category.rhythm.as_str(),
                category.color.as_str(),
                category.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("finance category", category.id));
        }
        Ok(())
    }

    fn delete_category(&self, id: RecordId) -> RepoResult<()> {
        // Entries go through the foreign key cascade.
        let changed = self
            .conn
            .execute("DELETE FROM finance_categories WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("finance category", id));
        }
        Ok(())
    }

    fn list_entries(&self, filter: &EntryFilter) -> RepoResult<Vec<FinanceEntry>> {
        let mut sql = format!("{ENTRY_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(category_id) = filter.category_id {
            sql.push_str(" AND category_id = ?");
            bind_values.push(Value::Text(category_id.to_string()));
        }
        if let Some(start) = filter.start {
            sql.push_str(" AND date >= ?");
            bind_values.push(Value::Text(date_to_db(start)));
        }
        if let Some(end) = filter.end {
            sql.push_str(" AND date <= ?");
            bind_values.push(Value::Text(date_to_db(end)));
        }
        sql.push_str(" ORDER BY date DESC, created_at DESC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }
        Ok(entries)
    }

    fn create_entry(&self, entry: &FinanceEntry) -> RepoResult<RecordId> {
        entry.validate()?;
        let category_exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM finance_categories WHERE id = ?1;",
                [entry.category_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if category_exists.is_none() {
            return Err(RepoError::not_found("finance category", entry.category_id));
        }

        self.conn.execute(
            "INSERT INTO finance_entries (id, category_id, date, description, amount)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                entry.id.to_string(),
                entry.category_id.to_string(),
                date_to_db(entry.date),
                entry.description.as_str(),
                entry.amount,
            ],
        )?;
        Ok(entry.id)
    }

    fn update_entry(&self, entry: &FinanceEntry) -> RepoResult<()> {
        entry.validate()?;
        let changed = self.conn.execute(
            "UPDATE finance_entries
             SET category_id = ?1, date = ?2, description = ?3, amount = ?4
             WHERE id = ?5;",
            params![
                entry.category_id.to_string(),
                date_to_db(entry.date),
                entry.description.as_str(),
                entry.amount,
                entry.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("finance entry", entry.id));
        }
        Ok(())
    }

    fn delete_entry(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM finance_entries WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("finance entry", id));
        }
        Ok(())
    }
}

fn parse_category_row(row: &Row<'_>) -> RepoResult<FinanceCategory> {
    const TABLE: &str = "finance_categories";
    Ok(FinanceCategory {
        id: uuid_col(row, TABLE, "id")?,
        name: row.get("name")?,
        budget: row.get("budget")?,
        rhythm: enum_col(row, TABLE, "rhythm", BudgetRhythm::parse)?,
        color: row.get("color")?,
    })
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<FinanceEntry> {
    const TABLE: &str = "finance_entries";
    Ok(FinanceEntry {
        id: uuid_col(row, TABLE, "id")?,
        category_id: uuid_col(row, TABLE, "category_id")?,
        date: date_col(row, TABLE, "date")?,
        description: row.get("description")?,
        amount: row.get("amount")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{FinanceRepository, SqliteFinanceRepository};
    use crate::db::open_db_in_memory;
    use crate::model::finance::{CategoryInput, EntryFilter, FinanceEntryInput};
    use crate::repo::RepoError;
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[test]
    fn delete_category_cascades_entries() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteFinanceRepository::new(&conn);
        let category = CategoryInput::new("Abos", 30.0).into_new_category();
        repo.create_category(&category).unwrap();
        let entry = FinanceEntryInput {
            category_id: category.id,
            date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            description: "Streaming".to_string(),
            amount: 12.99,
        }
        .into_entry();
        repo.create_entry(&entry).unwrap();

        repo.delete_category(category.id).unwrap();
        assert!(repo.list_entries(&EntryFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn entry_for_unknown_category_is_not_found() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteFinanceRepository::new(&conn);
        let entry = FinanceEntryInput {
            category_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            description: String::new(),
            amount: 1.0,
        }
        .into_entry();
        assert!(matches!(
            repo.create_entry(&entry),
            Err(RepoError::NotFound { .. })
        ));
    }
}
