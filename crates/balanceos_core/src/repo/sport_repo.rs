//! Sport day repository contract and SQLite implementation.
//!
//! # Invariants
//! - One `sport_days` row per date; workouts reference the day by date and
//!   are deleted with it.
//! - Workouts are returned in insertion order.
//! - Writes touching a day and its workouts run in one transaction.

use crate::model::sport::{SportDay, Workout};
use crate::model::vitals::EntrySource;
use crate::model::RecordId;
use crate::repo::codec::{
    bool_col, bool_to_int, date_col, date_to_db, enum_col, json_col, to_json, uuid_col,
};
use crate::repo::{RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashMap;
use uuid::Uuid;

const DAY_SELECT_SQL: &str = "SELECT
    id,
    date,
    steps,
    calories_burned,
    custom_metrics,
    manual_override,
    source
FROM sport_days";

const WORKOUT_SELECT_SQL: &str = "SELECT
    id,
    date,
    type,
    duration,
    calories_burned,
    distance,
    notes
FROM workouts";

pub trait SportRepository {
    /// The stored day with its workouts.
    fn get_by_date(&self, date: NaiveDate) -> RepoResult<Option<SportDay>>;
    /// Writes the day row and replaces its workouts with `day.workouts`.
    fn upsert_day(&self, day: &SportDay) -> RepoResult<SportDay>;
    /// Appends a workout, creating an empty day first when needed.
    fn add_workout(&self, date: NaiveDate, workout: &Workout) -> RepoResult<SportDay>;
    /// Removes one workout of an existing day; unknown workout ids are ignored.
    fn delete_workout(&self, date: NaiveDate, workout_id: RecordId) -> RepoResult<SportDay>;
    /// Chronological, inclusive on both ends.
    fn list_range(&self, start: NaiveDate, end: NaiveDate) -> RepoResult<Vec<SportDay>>;
}

impl<T: SportRepository + ?Sized> SportRepository for &T {
    fn get_by_date(&self, date: NaiveDate) -> RepoResult<Option<SportDay>> {
        (**self).get_by_date(date)
    }

    fn upsert_day(&self, day: &SportDay) -> RepoResult<SportDay> {
        (**self).upsert_day(day)
    }

    fn add_workout(&self, date: NaiveDate, workout: &Workout) -> RepoResult<SportDay> {
        (**self).add_workout(date, workout)
    }

    fn delete_workout(&self, date: NaiveDate, workout_id: RecordId) -> RepoResult<SportDay> {
        (**self).delete_workout(date, workout_id)
    }

    fn list_range(&self, start: NaiveDate, end: NaiveDate) -> RepoResult<Vec<SportDay>> {
        (**self).list_range(start, end)
    }
}

pub struct SqliteSportRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSportRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_required_day(&self, date: NaiveDate) -> RepoResult<SportDay> {
        self.get_by_date(date)?
            .ok_or_else(|| RepoError::not_found("sport day", date))
    }
}

impl SportRepository for SqliteSportRepository<'_> {
    fn get_by_date(&self, date: NaiveDate) -> RepoResult<Option<SportDay>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DAY_SELECT_SQL} WHERE date = ?1;"))?;
        let mut rows = stmt.query([date_to_db(date)])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let mut day = parse_day_row(row)?;
        day.workouts = list_workouts(
            self.conn,
            &format!("{WORKOUT_SELECT_SQL} WHERE date = ?1 ORDER BY created_at ASC, rowid ASC;"),
            [date_to_db(date)],
        )?
        .into_iter()
        .map(|(_, workout)| workout)
        .collect();
        Ok(Some(day))
    }

    fn upsert_day(&self, day: &SportDay) -> RepoResult<SportDay> {
        day.validate()?;
        if day.source == EntrySource::CarriedOver {
            return Err(RepoError::InvalidData(
                "carried_over sport days cannot be stored".to_string(),
            ));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO sport_days (
                id,
                date,
                steps,
                calories_burned,
                custom_metrics,
                manual_override,
                source
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (date) DO UPDATE SET
                steps = excluded.steps,
                calories_burned = excluded.calories_burned,
                custom_metrics = excluded.custom_metrics,
                manual_override = excluded.manual_override,
                source = excluded.source,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                day.id.unwrap_or_else(Uuid::new_v4).to_string(),
                date_to_db(day.date),
                day.steps,
                day.calories_burned,
                to_json(&day.custom_metrics)?,
                bool_to_int(day.manual_override),
                day.source.as_str(),
            ],
        )?;
        tx.execute("DELETE FROM workouts WHERE date = ?1;", [date_to_db(day.date)])?;
        for workout in &day.workouts {
            insert_workout(&tx, day.date, workout)?;
        }
        tx.commit()?;

        self.load_required_day(day.date)
    }

    fn add_workout(&self, date: NaiveDate, workout: &Workout) -> RepoResult<SportDay> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT OR IGNORE INTO sport_days (id, date) VALUES (?1, ?2);",
            params![Uuid::new_v4().to_string(), date_to_db(date)],
        )?;
        insert_workout(&tx, date, workout)?;
        tx.execute(
            "UPDATE sport_days
             SET updated_at = (strftime('%s', 'now') * 1000)
             WHERE date = ?1;",
            [date_to_db(date)],
        )?;
        tx.commit()?;

        self.load_required_day(date)
    }

    fn delete_workout(&self, date: NaiveDate, workout_id: RecordId) -> RepoResult<SportDay> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sport_days WHERE date = ?1;",
                [date_to_db(date)],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(RepoError::not_found("sport day", date));
        }

        self.conn.execute(
            "DELETE FROM workouts WHERE id = ?1 AND date = ?2;",
            params![workout_id.to_string(), date_to_db(date)],
        )?;
        self.load_required_day(date)
    }

    fn list_range(&self, start: NaiveDate, end: NaiveDate) -> RepoResult<Vec<SportDay>> {
        let bounds = [date_to_db(start), date_to_db(end)];
        let mut stmt = self.conn.prepare(&format!(
            "{DAY_SELECT_SQL}
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date ASC;"
        ))?;
        let mut rows = stmt.query(bounds.clone())?;
        let mut days = Vec::new();
        while let Some(row) = rows.next()? {
            days.push(parse_day_row(row)?);
        }

        let mut workouts_by_date: HashMap<NaiveDate, Vec<Workout>> = HashMap::new();
        for (date, workout) in list_workouts(
            self.conn,
            &format!(
                "{WORKOUT_SELECT_SQL}
                 WHERE date >= ?1 AND date <= ?2
                 ORDER BY created_at ASC, rowid ASC;"
            ),
            bounds,
        )? {
            workouts_by_date.entry(date).or_default().push(workout);
        }
        for day in &mut days {
            day.workouts = workouts_by_date.remove(&day.date).unwrap_or_default();
        }
        Ok(days)
    }
}

fn insert_workout(conn: &Connection, date: NaiveDate, workout: &Workout) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO workouts (
            id,
            date,
            type,
            duration,
            calories_burned,
            distance,
            notes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            workout.id.to_string(),
            date_to_db(date),
            workout.kind.as_str(),
            workout.duration,
            workout.calories_burned,
            workout.distance,
            workout.notes.as_deref(),
        ],
    )?;
    Ok(())
}

fn list_workouts(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> RepoResult<Vec<(NaiveDate, Workout)>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut workouts = Vec::new();
    while let Some(row) = rows.next()? {
        workouts.push(parse_workout_row(row)?);
    }
    Ok(workouts)
}

fn parse_day_row(row: &Row<'_>) -> RepoResult<SportDay> {
    const TABLE: &str = "sport_days";
    Ok(SportDay {
        id: Some(uuid_col(row, TABLE, "id")?),
        date: date_col(row, TABLE, "date")?,
        steps: row.get("steps")?,
        calories_burned: row.get("calories_burned")?,
        workouts: Vec::new(),
        custom_metrics: json_col(row, TABLE, "custom_metrics")?,
        manual_override: bool_col(row, TABLE, "manual_override")?,
        source: enum_col(row, TABLE, "source", EntrySource::parse)?,
    })
}

fn parse_workout_row(row: &Row<'_>) -> RepoResult<(NaiveDate, Workout)> {
    const TABLE: &str = "workouts";
    let workout = Workout {
        id: uuid_col(row, TABLE, "id")?,
        kind: row.get("type")?,
        duration: row.get("duration")?,
        calories_burned: row.get("calories_burned")?,
        distance: row.get("distance")?,
        notes: row.get("notes")?,
    };
    Ok((date_col(row, TABLE, "date")?, workout))
}

#[cfg(test)]
mod tests {
    use super::{SportRepository, SqliteSportRepository};
    use crate::db::open_db_in_memory;
    use crate::model::sport::{SportDay, WorkoutInput};
    use crate::repo::RepoError;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, day).unwrap()
    }

    #[test]
    fn add_workout_creates_missing_day() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteSportRepository::new(&conn);

        let day = repo
            .add_workout(date(1), &WorkoutInput::new("running", 35).into_workout())
            .unwrap();
        assert!(day.is_stored());
        assert_eq!(day.steps, 0);
        assert_eq!(day.workouts.len(), 1);

        let day = repo
            .add_workout(date(1), &WorkoutInput::new("yoga", 20).into_workout())
            .unwrap();
        let kinds: Vec<&str> = day.workouts.iter().map(|w| w.kind.as_str()).collect();
        assert_eq!(kinds, vec!["running", "yoga"]);
    }

    #[test]
    fn upsert_replaces_workouts_and_keeps_metrics() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteSportRepository::new(&conn);
        repo.add_workout(date(2), &WorkoutInput::new("gym", 60).into_workout())
            .unwrap();

        let mut day = repo.get_by_date(date(2)).unwrap().unwrap();
        day.steps = 9000;
        day.workouts.clear();
        day.custom_metrics
            .insert("pace".to_string(), serde_json::json!("5:10"));
        let stored = repo.upsert_day(&day).unwrap();

        assert_eq!(stored.steps, 9000);
        assert!(stored.workouts.is_empty());
        assert_eq!(stored.custom_metrics["pace"], "5:10");
    }

    #[test]
    fn delete_workout_requires_existing_day() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteSportRepository::new(&conn);
        assert!(matches!(
            repo.delete_workout(date(3), Uuid::new_v4()),
            Err(RepoError::NotFound { .. })
        ));

        let workout = WorkoutInput::new("swim", 40).into_workout();
        repo.add_workout(date(3), &workout).unwrap();
        let day = repo.delete_workout(date(3), workout.id).unwrap();
        assert!(day.workouts.is_empty());
    }

    #[test]
    fn list_range_groups_workouts_per_day() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteSportRepository::new(&conn);
        repo.upsert_day(&SportDay {
            steps: 4000,
            ..SportDay::empty(date(4))
        })
        .unwrap();
        repo.add_workout(date(5), &WorkoutInput::new("bike", 45).into_workout())
            .unwrap();
        repo.add_workout(date(9), &WorkoutInput::new("bike", 45).into_workout())
            .unwrap();

        let days = repo.list_range(date(4), date(5)).unwrap();
        assert_eq!(days.len(), 2);
        assert!(days[0].workouts.is_empty());
        assert_eq!(days[1].workout_minutes(), 45);
    }
}
