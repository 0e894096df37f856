//! Profile repository contract and SQLite implementation.
//!
//! # Invariants
//! - The profile table holds exactly one row (`id = 1`); reads recreate it
//!   with defaults when missing.
//! - Goal and settings columns store JSON that tolerates missing keys.

use crate::model::calendar::Language;
use crate::model::profile::{Gender, Profile};
use crate::repo::codec::{
    date_to_db, enum_col, json_col, optional_date_col, optional_enum_col, to_json,
};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PROFILE_SELECT_SQL: &str = "SELECT
    birth_date,
    height,
    gender,
    language,
    overall_goal,
    nutrient_goals,
    vital_goals,
    sport_goals,
    tracking_settings,
    updated_at
FROM profile
WHERE id = 1;";

pub trait ProfileRepository {
    /// Returns the stored profile, creating the default one on first use.
    fn load_profile(&self) -> RepoResult<Profile>;
    /// Replaces the stored profile and returns it with a fresh `updated_at`.
    fn save_profile(&self, profile: &Profile) -> RepoResult<Profile>;
}

impl<T: ProfileRepository + ?Sized> ProfileRepository for &T {
    fn load_profile(&self) -> RepoResult<Profile> {
        (**self).load_profile()
    }

    fn save_profile(&self, profile: &Profile) -> RepoResult<Profile> {
        (**self).save_profile(profile)
    }
}

pub struct SqliteProfileRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProfileRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ProfileRepository for SqliteProfileRepository<'_> {
    fn load_profile(&self) -> RepoResult<Profile> {
        self.conn
            .execute("INSERT OR IGNORE INTO profile (id) VALUES (1);", [])?;
        let mut stmt = self.conn.prepare(PROFILE_SELECT_SQL)?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => parse_profile_row(row),
            None => Err(RepoError::not_found("profile", 1)),
        }
    }

    fn save_profile(&self, profile: &Profile) -> RepoResult<Profile> {
        profile.validate()?;

        self.conn.execute(
            "INSERT INTO profile (
                id,
                birth_date,
                height,
                gender,
                language,
                overall_goal,
                nutrient_goals,
                vital_goals,
                sport_goals,
                tracking_settings
            ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (id) DO UPDATE SET
                birth_date = excluded.birth_date,
                height = excluded.height,
                gender = excluded.gender,
                language = excluded.language,
                overall_goal = excluded.overall_goal,
                nutrient_goals = excluded.nutrient_goals,
                vital_goals = excluded.vital_goals,
                sport_goals = excluded.sport_goals,
                tracking_settings = excluded.tracking_settings,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                profile.birth_date.map(date_to_db),
                profile.height,
                profile.gender.map(Gender::as_str),
                profile.language.as_str(),
                profile.overall_goal.as_deref(),
                to_json(&profile.nutrient_goals)?,
                to_json(&profile.vital_goals)?,
                to_json(&profile.sport_goals)?,
                to_json(&profile.tracking_settings)?,
            ],
        )?;

        let updated_at: Option<i64> = self
            .conn
            .query_row("SELECT updated_at FROM profile WHERE id = 1;", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(Profile {
            updated_at: updated_at.unwrap_or(profile.updated_at),
            ..profile.clone()
        })
    }
}

fn parse_profile_row(row: &Row<'_>) -> RepoResult<Profile> {
    Ok(Profile {
        birth_date: optional_date_col(row, "profile", "birth_date")?,
        height: row.get("height")?,
        gender: optional_enum_col(row, "profile", "gender", Gender::parse)?,
        language: enum_col(row, "profile", "language", Language::parse)?,
        overall_goal: row.get("overall_goal")?,
        nutrient_goals: json_col(row, "profile", "nutrient_goals")?,
        vital_goals: json_col(row, "profile", "vital_goals")?,
        sport_goals: json_col(row, "profile", "sport_goals")?,
        tracking_settings: json_col(row, "profile", "tracking_settings")?,
        updated_at: row.get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{ProfileRepository, SqliteProfileRepository};
    use crate::db::open_db_in_memory;
    use crate::model::profile::Gender;

    #[test]
    fn load_returns_defaults_then_save_round_trips() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteProfileRepository::new(&conn);

        let mut profile = repo.load_profile().unwrap();
        assert_eq!(profile.nutrient_goals.calories, 2000.0);
        assert!(profile.gender.is_none());

        profile.gender = Some(Gender::Female);
        profile.height = Some(168.0);
        profile.nutrient_goals.protein = 120.0;
        repo.save_profile(&profile).unwrap();

        let loaded = repo.load_profile().unwrap();
        assert_eq!(loaded.gender, Some(Gender::Female));
        assert_eq!(loaded.height, Some(168.0));
        assert_eq!(loaded.nutrient_goals.protein, 120.0);
        assert_eq!(loaded.nutrient_goals.water, 2000.0);
    }

    #[test]
    fn load_recreates_deleted_row() {
        let conn = open_db_in_memory().unwrap();
        conn.execute("DELETE FROM profile;", []).unwrap();
        let repo = SqliteProfileRepository::new(&conn);
        assert!(repo.load_profile().is_ok());
    }
}
