//! Block rule and temporary unlock repository contract and SQLite implementation.
//!
//! # Invariants
//! - Rule schedules are stored as `days` JSON plus `HH:MM` start/end columns.
//! - Instants are stored as local `YYYY-MM-DDTHH:MM:SS` text, so string
//!   comparison matches chronological order.
//! - Deleting a rule deletes its temporary unlocks.

use crate::model::blocker::{BlockRule, BlockSchedule, TemporaryUnlock, UnlockMethod};
use crate::model::RecordId;
use crate::repo::codec::{
    bool_col, bool_to_int, datetime_col, datetime_to_db, enum_col, json_col,
    optional_datetime_col, time_col, time_to_db, to_json, uuid_col,
};
use crate::repo::{RepoError, RepoResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};

const RULE_SELECT_SQL: &str = "SELECT
    id,
    name,
    apps,
    block_all,
    days,
    start_time,
    end_time,
    unlock_method,
    password,
    sport_minutes_required,
    allow_temporary_unlock,
    temporary_unlock_minutes,
    strict_mode,
    is_active,
    edit_locked_until,
    created_at
FROM block_rules";

pub trait BlockerRepository {
    /// Oldest rule first.
    fn list_rules(&self) -> RepoResult<Vec<BlockRule>>;
    fn get_rule(&self, id: RecordId) -> RepoResult<Option<BlockRule>>;
    fn create_rule(&self, rule: &BlockRule) -> RepoResult<RecordId>;
    fn update_rule(&self, rule: &BlockRule) -> RepoResult<()>;
    fn delete_rule(&self, id: RecordId) -> RepoResult<()>;
    fn insert_unlock(&self, unlock: &TemporaryUnlock) -> RepoResult<()>;
    /// Unlocks whose expiry lies after `now`.
    fn list_unlocks_active_at(&self, now: NaiveDateTime) -> RepoResult<Vec<TemporaryUnlock>>;
    /// Drops unlocks that expired at or before `now`; returns how many.
    fn purge_expired_unlocks(&self, now: NaiveDateTime) -> RepoResult<usize>;
}

impl<T: BlockerRepository + ?Sized> BlockerRepository for &T {
    fn list_rules(&self) -> RepoResult<Vec<BlockRule>> {
        (**self).list_rules()
    }

    fn get_rule(&self, id: RecordId) -> RepoResult<Option<BlockRule>> {
        (**self).get_rule(id)
    }

    fn create_rule(&self, rule: &BlockRule) -> RepoResult<RecordId> {
        (**self).create_rule(rule)
    }

    fn update_rule(&self, rule: &BlockRule) -> RepoResult<()> {
        (**self).update_rule(rule)
    }

    fn delete_rule(&self, id: RecordId) -> RepoResult<()> {
        (**self).delete_rule(id)
    }

    fn insert_unlock(&self, unlock: &TemporaryUnlock) -> RepoResult<()> {
        (**self).insert_unlock(unlock)
    }

    fn list_unlocks_active_at(&self, now: NaiveDateTime) -> RepoResult<Vec<TemporaryUnlock>> {
        (**self).list_unlocks_active_at(now)
    }

    fn purge_expired_unlocks(&self, now: NaiveDateTime) -> RepoResult<usize> {
        (**self).purge_expired_unlocks(now)
    }
}

pub struct SqliteBlockerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBlockerRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_rules(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<BlockRule>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut rules = Vec::new();
        while let Some(row) = rows.next()? {
            rules.push(parse_rule_row(row)?);
        }
        Ok(rules)
    }
}

impl BlockerRepository for SqliteBlockerRepository<'_> {
    fn list_rules(&self) -> RepoResult<Vec<BlockRule>> {
        self.query_rules(
            &format!("{RULE_SELECT_SQL} ORDER BY created_at ASC, id ASC;"),
            [],
        )
    }

    fn get_rule(&self, id: RecordId) -> RepoResult<Option<BlockRule>> {
        let mut rules =
            self.query_rules(&format!("{RULE_SELECT_SQL} WHERE id = ?1;"), [id.to_string()])?;
        Ok(rules.pop())
    }

    fn create_rule(&self, rule: &BlockRule) -> RepoResult<RecordId> {
        rule.validate()?;
        self.conn.execute(
            "INSERT INTO block_rules (
                id,
                name,
                apps,
                block_all,
                days,
                start_time,
                end_time,
                unlock_method,
                password,
                sport_minutes_required,
                allow_temporary_unlock,
                temporary_unlock_minutes,
                strict_mode,
                is_active,
                edit_locked_until,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16);",
            params![
                rule.id.to_string(),
                rule.name.as_str(),
                to_json(&rule.apps)?,
                bool_to_int(rule.block_all),
                to_json(&rule.schedule.days)?,
                time_to_db(rule.schedule.start_time),
                time_to_db(rule.schedule.end_time),
                rule.unlock_method.as_str(),
                rule.password.as_deref(),
                rule.sport_minutes_required,
                bool_to_int(rule.allow_temporary_unlock),
                rule.temporary_unlock_minutes,
                bool_to_int(rule.strict_mode),
                bool_to_int(rule.is_active),
                rule.edit_locked_until.map(datetime_to_db),
                datetime_to_db(rule.created_at),
            ],
        )?;
        Ok(rule.id)
    }

    fn update_rule(&self, rule: &BlockRule) -> RepoResult<()> {
        rule.validate()?;
        let changed = self.conn.execute(
            "UPDATE block_rules
             SET
                name = ?1,
                apps = ?2,
                block_all = ?3,
                days = ?4,
                start_time = ?5,
                end_time = ?6,
                unlock_method = ?7,
                password = ?8,
                sport_minutes_required = ?9,
                allow_temporary_unlock = ?10,
                temporary_unlock_minutes = ?11,
                strict_mode = ?12,
                is_active = ?13,
                edit_locked_until = ?14
             WHERE id = ?15;",
            params![
                rule.name.as_str(),
                to_json(&rule.apps)?,
                bool_to_int(rule.block_all),
                to_json(&rule.schedule.days)?,
                time_to_db(rule.schedule.start_time),
                time_to_db(rule.schedule.end_time),
                rule.unlock_method.as_str(),
                rule.password.as_deref(),
                rule.sport_minutes_required,
                bool_to_int(rule.allow_temporary_unlock),
                rule.temporary_unlock_minutes,
                bool_to_int(rule.strict_mode),
                bool_to_int(rule.is_active),
                rule.edit_locked_until.map(datetime_to_db),
                rule.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("block rule", rule.id));
        }
        Ok(())
    }

    fn delete_rule(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM block_rules WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("block rule", id));
        }
        Ok(())
    }

    fn insert_unlock(&self, unlock: &TemporaryUnlock) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO temporary_unlocks (id, rule_id, app_name, unlocked_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                unlock.id.to_string(),
                unlock.rule_id.to_string(),
                unlock.app_name.as_deref(),
                datetime_to_db(unlock.unlocked_at),
                datetime_to_db(unlock.expires_at),
            ],
        )?;
        Ok(())
    }

    fn list_unlocks_active_at(&self, now: NaiveDateTime) -> RepoResult<Vec<TemporaryUnlock>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, rule_id, app_name, unlocked_at, expires_at
             FROM temporary_unlocks
             WHERE expires_at > ?1
             ORDER BY expires_at ASC, id ASC;",
        )?;
        let mut rows = stmt.query([datetime_to_db(now)])?;
        let mut unlocks = Vec::new();
        while let Some(row) = rows.next()? {
            unlocks.push(parse_unlock_row(row)?);
        }
        Ok(unlocks)
    }

    fn purge_expired_unlocks(&self, now: NaiveDateTime) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM temporary_unlocks WHERE expires_at <= ?1;",
            [datetime_to_db(now)],
        )?;
        Ok(removed)
    }
}

fn parse_rule_row(row: &Row<'_>) -> RepoResult<BlockRule> {
    const TABLE: &str = "block_rules";
    let rule = BlockRule {
        id: uuid_col(row, TABLE, "id")?,
        name: row.get("name")?,
        apps: json_col(row, TABLE, "apps")?,
        block_all: bool_col(row, TABLE, "block_all")?,
        schedule: BlockSchedule {
            days: json_col(row, TABLE, "days")?,
            start_time: time_col(row, TABLE, "start_time")?,
            end_time: time_col(row, TABLE, "end_time")?,
        },
        unlock_method: enum_col(row, TABLE, "unlock_method", UnlockMethod::parse)?,
        password: row.get("password")?,
        sport_minutes_required: row.get("sport_minutes_required")?,
        allow_temporary_unlock: bool_col(row, TABLE, "allow_temporary_unlock")?,
        temporary_unlock_minutes: row.get("temporary_unlock_minutes")?,
        strict_mode: bool_col(row, TABLE, "strict_mode")?,
        is_active: bool_col(row, TABLE, "is_active")?,
        edit_locked_until: optional_datetime_col(row, TABLE, "edit_locked_until")?,
        created_at: datetime_col(row, TABLE, "created_at")?,
    };
    Ok(rule)
}

fn parse_unlock_row(row: &Row<'_>) -> RepoResult<TemporaryUnlock> {
    const TABLE: &str = "temporary_unlocks";
    Ok(TemporaryUnlock {
        id: uuid_col(row, TABLE, "id")?,
        rule_id: uuid_col(row, TABLE, "rule_id")?,
        app_name: row.get("app_name")?,
        unlocked_at: datetime_col(row, TABLE, "unlocked_at")?,
        expires_at: datetime_col(row, TABLE, "expires_at")?,
    })
}
