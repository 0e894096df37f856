//! App-blocker use-cases.
//!
//! # Responsibility
//! - Rule CRUD guarded by edit locks and active windows.
//! - Unlock checks: password, sport minutes, temporary unlock grants.
//! - Blocking status for the shell.
//!
//! # Invariants
//! - A rule is neither updated nor deleted while `now < edit_locked_until`
//!   or while it is blocking.
//! - Rules leaving this service through `status` never carry the password.
//! - Temporary unlocks are refused in strict mode and when disabled.

use crate::model::blocker::{
    BlockRule, BlockRuleInput, BlockRulePatch, BlockerStatus, SportVerification, TemporaryUnlock,
};
use crate::model::{RecordId, ValidationError};
use crate::repo::{RepoError, Repositories};
use chrono::{NaiveDate, NaiveDateTime};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from app-blocker operations.
#[derive(Debug)]
pub enum BlockerServiceError {
    /// Target rule does not exist.
    RuleNotFound(RecordId),
    /// Rule cannot be changed before the lock expires.
    EditLocked {
        id: RecordId,
        until: NaiveDateTime,
    },
    /// Rule cannot be changed while it is blocking.
    RuleActive(RecordId),
    /// Strict mode or disabled temporary unlocks.
    TemporaryUnlockDisabled(RecordId),
    Validation(ValidationError),
    Repo(RepoError),
}

impl Display for BlockerServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RuleNotFound(id) => write!(f, "block rule not found: {id}"),
            Self::EditLocked { id, until } => write!(
                f,
                "block rule {id} is locked until {}",
                until.format("%d.%m.%Y")
            ),
            Self::RuleActive(id) => {
                write!(f, "block rule {id} cannot be changed during its active window")
            }
            Self::TemporaryUnlockDisabled(id) => {
                write!(f, "temporary unlock is disabled for block rule {id}")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BlockerServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for BlockerServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for BlockerServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

pub type BlockerResult<T> = Result<T, BlockerServiceError>;

/// Blocker facade; sport verification reads the sport repository too.
pub struct BlockerService<'a, 'conn> {
    repos: &'a Repositories<'conn>,
}

impl<'a, 'conn> BlockerService<'a, 'conn> {
    pub fn new(repos: &'a Repositories<'conn>) -> Self {
        Self { repos }
    }

    /// All rules without their passwords.
    pub fn list_rules(&self) -> BlockerResult<Vec<BlockRule>> {
        Ok(self
            .repos
            .blocker
            .list_rules()?
            .iter()
            .map(BlockRule::without_password)
            .collect())
    }

    pub fn get_rule(&self, id: RecordId) -> BlockerResult<BlockRule> {
        Ok(self.load_rule(id)?.without_password())
    }

    /// Creates a rule; `edit_lock_days` starts counting at `now`.
    pub fn create_rule(
        &self,
        input: BlockRuleInput,
        now: NaiveDateTime,
    ) -> BlockerResult<BlockRule> {
        let rule = input.into_rule(now)?;
        let id = self.repos.blocker.create_rule(&rule)?;
        Ok(self.load_rule(id)?.without_password())
    }

    /// # Contract
    /// - Refused with `EditLocked` before the lock expires, then with
    ///   `RuleActive` while `now` is inside the schedule window, whether or
    ///   not the rule is switched on.
    pub fn update_rule(
        &self,
        id: RecordId,
        patch: BlockRulePatch,
        now: NaiveDateTime,
    ) -> BlockerResult<BlockRule> {
        let mut rule = self.load_rule(id)?;
        ensure_editable(&rule, now)?;
        patch.apply_to(&mut rule);
        rule.validate()?;
        self.repos.blocker.update_rule(&rule)?;
        Ok(self.load_rule(id)?.without_password())
    }

    /// Same guards as [`BlockerService::update_rule`]; unlocks of the rule go
    /// with it.
    pub fn delete_rule(&self, id: RecordId, now: NaiveDateTime) -> BlockerResult<()> {
        let rule = self.load_rule(id)?;
        ensure_editable(&rule, now)?;
        self.repos.blocker.delete_rule(id)?;
        Ok(())
    }

    pub fn verify_password(&self, id: RecordId, candidate: &str) -> BlockerResult<bool> {
        Ok(self.load_rule(id)?.verify_password(candidate))
    }

    /// Compares workout minutes logged on `today` with the rule's minimum.
    pub fn verify_sport(&self, id: RecordId, today: NaiveDate) -> BlockerResult<SportVerification> {
        let rule = self.load_rule(id)?;
        let minutes_done = self
            .repos
            .sport
            .get_by_date(today)?
            .map_or(0, |day| day.workout_minutes());
        Ok(SportVerification {
            verified: minutes_done >= u64::from(rule.sport_minutes_required),
            minutes_done,
            minutes_required: rule.sport_minutes_required,
        })
    }

    pub fn temporary_unlock(
        &self,
        id: RecordId,
        app_name: Option<String>,
        now: NaiveDateTime,
    ) -> BlockerResult<TemporaryUnlock> {
        let rule = self.load_rule(id)?;
        if !rule.allows_temporary_unlock() {
            return Err(BlockerServiceError::TemporaryUnlockDisabled(id));
        }
        let unlock = TemporaryUnlock::grant(&rule, app_name, now);
        self.repos.blocker.insert_unlock(&unlock)?;
        Ok(unlock)
    }

    /// Unexpired unlocks; expired ones are purged on the way.
    pub fn active_unlocks(&self, now: NaiveDateTime) -> BlockerResult<Vec<TemporaryUnlock>> {
        self.repos.blocker.purge_expired_unlocks(now)?;
        Ok(self.repos.blocker.list_unlocks_active_at(now)?)
    }

    pub fn status(&self, now: NaiveDateTime) -> BlockerResult<BlockerStatus> {
        let active_rules: Vec<BlockRule> = self
            .repos
            .blocker
            .list_rules()?
            .iter()
            .filter(|rule| rule.is_blocking(now))
            .map(BlockRule::without_password)
            .collect();
        Ok(BlockerStatus {
            is_blocking: !active_rules.is_empty(),
            active_rules,
        })
    }

    fn load_rule(&self, id: RecordId) -> BlockerResult<BlockRule> {
        self.repos
            .blocker
            .get_rule(id)?
            .ok_or(BlockerServiceError::RuleNotFound(id))
    }
}

fn ensure_editable(rule: &BlockRule, now: NaiveDateTime) -> BlockerResult<()> {
    if rule.is_edit_locked(now) {
        if let Some(until) = rule.edit_locked_until {
            return Err(BlockerServiceError::EditLocked { id: rule.id, until });
        }
    }
    if rule.is_in_window(now) {
        return Err(BlockerServiceError::RuleActive(rule.id));
    }
    Ok(())
}
