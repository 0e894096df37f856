//! Vitals repository contract and SQLite implementation.
//!
//! # Invariants
//! - One row per date; upserts keep the row id of an existing date.
//! - `carried_over` entries are synthesized by the service and never stored.

use crate::model::vitals::{EntrySource, VitalEntry};
use crate::repo::codec::{
    bool_col, bool_to_int, date_col, date_to_db, enum_col, optional_time_col, time_to_db, uuid_col,
};
use crate::repo::{RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const VITALS_SELECT_SQL: &str = "SELECT
    id,
    date,
    weight,
    body_fat,
    sleep_start,
    sleep_end,
    sleep_duration,
    sleep_quality,
    morning_energy,
    resting_heart_rate,
    basal_metabolic_rate,
    neat,
    manual_override,
    source
FROM vitals";

pub trait VitalsRepository {
    fn get_by_date(&self, date: NaiveDate) -> RepoResult<Option<VitalEntry>>;
    /// Inserts or replaces the entry of `entry.date`; returns the stored row.
    fn upsert(&self, entry: &VitalEntry) -> RepoResult<VitalEntry>;
    /// Most recent entry strictly before `date`.
    fn latest_before(&self, date: NaiveDate) -> RepoResult<Option<VitalEntry>>;
    fn latest(&self) -> RepoResult<Option<VitalEntry>>;
    /// Chronological, inclusive on both ends.
    fn list_range(&self, start: NaiveDate, end: NaiveDate) -> RepoResult<Vec<VitalEntry>>;
    /// Up to `limit` entries, newest first.
    fn list_recent(&self, limit: u32) -> RepoResult<Vec<VitalEntry>>;
}

impl<T: VitalsRepository + ?Sized> VitalsRepository for &T {
    fn get_by_date(&self, date: NaiveDate) -> RepoResult<Option<VitalEntry>> {
        (**self).get_by_date(date)
    }

    fn upsert(&self, entry: &VitalEntry) -> RepoResult<VitalEntry> {
        (**self).upsert(entry)
    }

    fn latest_before(&self, date: NaiveDate) -> RepoResult<Option<VitalEntry>> {
        (**self).latest_before(date)
    }

    fn latest(&self) -> RepoResult<Option<VitalEntry>> {
        (**self).latest()
    }

    fn list_range(&self, start: NaiveDate, end: NaiveDate) -> RepoResult<Vec<VitalEntry>> {
        (**self).list_range(start, end)
    }

    fn list_recent(&self, limit: u32) -> RepoResult<Vec<VitalEntry>> {
        (**self).list_recent(limit)
    }
}

pub struct SqliteVitalsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteVitalsRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<VitalEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_vitals_row(row)?);
        }
        Ok(entries)
    }
}

impl VitalsRepository for SqliteVitalsRepository<'_> {
    fn get_by_date(&self, date: NaiveDate) -> RepoResult<Option<VitalEntry>> {
        let mut entries = self.query(
            &format!("{VITALS_SELECT_SQL} WHERE date = ?1;"),
            [date_to_db(date)],
        )?;
        Ok(entries.pop())
    }

    fn upsert(&self, entry: &VitalEntry) -> RepoResult<VitalEntry> {
        entry.validate()?;
        if entry.source == EntrySource::CarriedOver {
            return Err(RepoError::InvalidData(
                "carried_over vitals cannot be stored".to_string(),
            ));
        }

        let id = entry.id.unwrap_or_else(Uuid::new_v4);
        self.conn.execute(
            "INSERT INTO vitals (
                id,
                date,
                weight,
                body_fat,
                sleep_start,
                sleep_end,
                sleep_duration,
                sleep_quality,
                morning_energy,
                resting_heart_rate,
                basal_metabolic_rate,
                neat,
                manual_override,
                source
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT (date) DO UPDATE SET
                weight = excluded.weight,
                body_fat = excluded.body_fat,
                sleep_start = excluded.sleep_start,
                sleep_end = excluded.sleep_end,
                sleep_duration = excluded.sleep_duration,
                sleep_quality = excluded.sleep_quality,
                morning_energy = excluded.morning_energy,
                resting_heart_rate = excluded.resting_heart_rate,
                basal_metabolic_rate = excluded.basal_metabolic_rate,
                neat = excluded.neat,
                manual_override = excluded.manual_override,
                source = excluded.source,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                id.to_string(),
                date_to_db(entry.date),
                entry.weight,
                entry.body_fat,
                entry.sleep_start.map(time_to_db),
                entry.sleep_end.map(time_to_db),
                entry.sleep_duration,
                entry.sleep_quality,
                entry.morning_energy,
                entry.resting_heart_rate,
                entry.basal_metabolic_rate,
                entry.neat,
                bool_to_int(entry.manual_override),
                entry.source.as_str(),
            ],
        )?;

        self.get_by_date(entry.date)?
            .ok_or_else(|| RepoError::not_found("vitals", entry.date))
    }

    fn latest_before(&self, date: NaiveDate) -> RepoResult<Option<VitalEntry>> {
        let mut entries = self.query(
            &format!("{VITALS_SELECT_SQL} WHERE date < ?1 ORDER BY date DESC LIMIT 1;"),
            [date_to_db(date)],
        )?;
        Ok(entries.pop())
    }

    fn latest(&self) -> RepoResult<Option<VitalEntry>> {
        let mut entries = self.query(
            &format!("{VITALS_SELECT_SQL} ORDER BY date DESC LIMIT 1;"),
            [],
        )?;
        Ok(entries.pop())
    }

    fn list_range(&self, start: NaiveDate, end: NaiveDate) -> RepoResult<Vec<VitalEntry>> {
        self.query(
            &format!(
                "{VITALS_SELECT_SQL}
                 WHERE date >= ?1 AND date <= ?2
                 ORDER BY date ASC;"
            ),
            [date_to_db(start), date_to_db(end)],
        )
    }

    fn list_recent(&self, limit: u32) -> RepoResult<Vec<VitalEntry>> {
        self.query(
            &format!("{VITALS_SELECT_SQL} ORDER BY date DESC LIMIT ?1;"),
            [i64::from(limit)],
        )
    }
}

fn parse_vitals_row(row: &Row<'_>) -> RepoResult<VitalEntry> {
    const TABLE: &str = "vitals";
    let entry = VitalEntry {
        id: Some(uuid_col(row, TABLE, "id")?),
        date: date_col(row, TABLE, "date")?,
        weight: row.get("weight")?,
        body_fat: row.get("body_fat")?,
        sleep_start: optional_time_col(row, TABLE, "sleep_start")?,
        sleep_end: optional_time_col(row, TABLE, "sleep_end")?,
        sleep_duration: row.get("sleep_duration")?,
        sleep_quality: row.get("sleep_quality")?,
        morning_energy: row.get("morning_energy")?,
        resting_heart_rate: row.get("resting_heart_rate")?,
        basal_metabolic_rate: row.get("basal_metabolic_rate")?,
        neat: row.get("neat")?,
        manual_override: bool_col(row, TABLE, "manual_override")?,
        source: enum_col(row, TABLE, "source", EntrySource::parse)?,
    };
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::{SqliteVitalsRepository, VitalsRepository};
    use crate::db::open_db_in_memory;
    use crate::model::vitals::{EntrySource, VitalEntry};
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, day).unwrap()
    }

    #[test]
    fn upsert_keeps_one_row_per_date() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteVitalsRepository::new(&conn);

        let first = repo
            .upsert(&VitalEntry {
                weight: Some(81.0),
                ..VitalEntry::empty(date(3))
            })
            .unwrap();
        let second = repo
            .upsert(&VitalEntry {
                weight: Some(80.4),
                ..VitalEntry::empty(date(3))
            })
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.weight, Some(80.4));
        assert_eq!(repo.list_recent(10).unwrap().len(), 1);
    }

    #[test]
    fn latest_before_skips_same_and_later_dates() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteVitalsRepository::new(&conn);
        for day in [1, 4, 9] {
            repo.upsert(&VitalEntry {
                weight: Some(70.0 + f64::from(day)),
                ..VitalEntry::empty(date(day))
            })
            .unwrap();
        }

        let previous = repo.latest_before(date(9)).unwrap().unwrap();
        assert_eq!(previous.date, date(4));
        assert!(repo.latest_before(date(1)).unwrap().is_none());
        assert_eq!(repo.latest().unwrap().unwrap().date, date(9));

        let recent = repo.list_recent(2).unwrap();
        assert_eq!(recent.iter().map(|e| e.date).collect::<Vec<_>>(), vec![date(9), date(4)]);
    }

    #[test]
    fn carried_over_entries_are_not_stored() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteVitalsRepository::new(&conn);
        let entry = VitalEntry {
            source: EntrySource::CarriedOver,
            ..VitalEntry::empty(date(2))
        };
        assert!(repo.upsert(&entry).is_err());
    }
}
