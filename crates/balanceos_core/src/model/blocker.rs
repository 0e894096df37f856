//! App-blocking rules, their schedules and temporary unlock grants.
//!
//! # Invariants
//! - Schedule times have minute granularity; a window is inclusive on both
//!   ends.
//! - A window with `start_time > end_time` runs past midnight; its early
//!   morning part belongs to the previous day's weekday.
//! - Rules using password unlock always carry a non-empty password.

use crate::model::calendar::{hhmm, truncate_to_minute, DayOfWeek};
use crate::model::{require_in_range, require_text, RecordId, ValidationError};
use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_SPORT_MINUTES: u32 = 30;
pub const DEFAULT_TEMPORARY_UNLOCK_MINUTES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSchedule {
    /// Empty means every day.
    #[serde(default)]
    pub days: Vec<DayOfWeek>,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

impl BlockSchedule {
    pub fn applies_on(&self, day: DayOfWeek) -> bool {
        self.days.is_empty() || self.days.contains(&day)
    }

    pub fn spans_midnight(&self) -> bool {
        self.start_time > self.end_time
    }

    /// Whether `now` (local wall-clock) falls inside the window.
    pub fn contains(&self, now: NaiveDateTime) -> bool {
        let time = truncate_to_minute(now.time());
        let today = DayOfWeek::of(now.date());
        if !self.spans_midnight() {
            return self.applies_on(today) && self.start_time <= time && time <= self.end_time;
        }

        if time >= self.start_time {
            return self.applies_on(today);
        }
        if time <= self.end_time {
            return match now.date().pred_opt() {
                Some(yesterday) => self.applies_on(DayOfWeek::of(yesterday)),
                None => false,
            };
        }
        false
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockMethod {
    #[default]
    Password,
    Sport,
    Both,
}

impl UnlockMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Sport => "sport",
            Self::Both => "both",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "password" => Some(Self::Password),
            "sport" => Some(Self::Sport),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    pub fn requires_password(self) -> bool {
        matches!(self, Self::Password | Self::Both)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRule {
    pub id: RecordId,
    pub name: String,
    /// App identifiers; empty blocks every app.
    pub apps: Vec<String>,
    pub block_all: bool,
    pub schedule: BlockSchedule,
    pub unlock_method: UnlockMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub sport_minutes_required: u32,
    pub allow_temporary_unlock: bool,
    pub temporary_unlock_minutes: u32,
    /// Disables temporary unlocks regardless of `allow_temporary_unlock`.
    pub strict_mode: bool,
    pub is_active: bool,
    pub edit_locked_until: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl BlockRule {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        if self.unlock_method.requires_password()
            && self
                .password
                .as_deref()
                .map_or(true, |password| password.is_empty())
        {
            return Err(ValidationError::Inconsistent(
                "password unlock requires a non-empty password",
            ));
        }
        require_in_range(
            "sport_minutes_required",
            i64::from(self.sport_minutes_required),
            0,
            24 * 60,
        )?;
        require_in_range(
            "temporary_unlock_minutes",
            i64::from(self.temporary_unlock_minutes),
            1,
            24 * 60,
        )?;
        Ok(())
    }

    pub fn is_edit_locked(&self, now: NaiveDateTime) -> bool {
        self.edit_locked_until.map_or(false, |until| now < until)
    }

    pub fn is_in_window(&self, now: NaiveDateTime) -> bool {
        self.schedule.contains(now)
    }

    /// Active flag set and inside the schedule window.
    pub fn is_blocking(&self, now: NaiveDateTime) -> bool {
        self.is_active && self.is_in_window(now)
    }

    pub fn allows_temporary_unlock(&self) -> bool {
        self.allow_temporary_unlock && !self.strict_mode
    }

    pub fn verify_password(&self, candidate: &str) -> bool {
        self.password
            .as_deref()
            .map_or(false, |password| !password.is_empty() && password == candidate)
    }

    /// Copy safe to hand to the shell.
    pub fn without_password(&self) -> BlockRule {
        BlockRule {
            password: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRuleInput {
    pub name: String,
    #[serde(default)]
    pub apps: Vec<String>,
    #[serde(default)]
    pub block_all: bool,
    pub schedule: BlockSchedule,
    #[serde(default)]
    pub unlock_method: UnlockMethod,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_sport_minutes")]
    pub sport_minutes_required: u32,
    /// Days from creation during which the rule cannot be edited or deleted.
    #[serde(default)]
    pub edit_lock_days: u32,
    #[serde(default = "default_true")]
    pub allow_temporary_unlock: bool,
    #[serde(default = "default_temporary_unlock_minutes")]
    pub temporary_unlock_minutes: u32,
    #[serde(default)]
    pub strict_mode: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_sport_minutes() -> u32 {
    DEFAULT_SPORT_MINUTES
}

fn default_temporary_unlock_minutes() -> u32 {
    DEFAULT_TEMPORARY_UNLOCK_MINUTES
}

fn default_true() -> bool {
    true
}

impl BlockRuleInput {
    pub fn new(name: impl Into<String>, schedule: BlockSchedule) -> Self {
        Self {
            name: name.into(),
            apps: Vec::new(),
            block_all: false,
            schedule,
            unlock_method: UnlockMethod::Password,
            password: None,
            sport_minutes_required: DEFAULT_SPORT_MINUTES,
            edit_lock_days: 0,
            allow_temporary_unlock: true,
            temporary_unlock_minutes: DEFAULT_TEMPORARY_UNLOCK_MINUTES,
            strict_mode: false,
            is_active: true,
        }
    }

    pub fn into_rule(self, now: NaiveDateTime) -> Result<BlockRule, ValidationError> {
        require_in_range("edit_lock_days", i64::from(self.edit_lock_days), 0, 365)?;
        let edit_locked_until =
            (self.edit_lock_days > 0).then(|| now + Duration::days(i64::from(self.edit_lock_days)));
        let rule = BlockRule {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            apps: normalize_apps(self.apps),
            block_all: self.block_all,
            schedule: self.schedule,
            unlock_method: self.unlock_method,
            password: self.password.filter(|password| !password.is_empty()),
            sport_minutes_required: self.sport_minutes_required,
            allow_temporary_unlock: self.allow_temporary_unlock,
            temporary_unlock_minutes: self.temporary_unlock_minutes,
            strict_mode: self.strict_mode,
            is_active: self.is_active,
            edit_locked_until,
            created_at: now,
        };
        rule.validate()?;
        Ok(rule)
    }
}

/// Partial rule update; absent fields keep stored values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockRulePatch {
    pub name: Option<String>,
    pub apps: Option<Vec<String>>,
    pub block_all: Option<bool>,
    pub schedule: Option<BlockSchedule>,
    pub unlock_method: Option<UnlockMethod>,
    pub password: Option<String>,
    pub sport_minutes_required: Option<u32>,
    pub allow_temporary_unlock: Option<bool>,
    pub temporary_unlock_minutes: Option<u32>,
    pub strict_mode: Option<bool>,
    pub is_active: Option<bool>,
}

impl BlockRulePatch {
    pub fn apply_to(self, rule: &mut BlockRule) {
        if let Some(name) = self.name {
            rule.name = name.trim().to_string();
        }
        if let Some(apps) = self.apps {
            rule.apps = normalize_apps(apps);
        }
        if let Some(block_all) = self.block_all {
            rule.block_all = block_all;
        }
        if let Some(schedule) = self.schedule {
            rule.schedule = schedule;
        }
        if let Some(method) = self.unlock_method {
            rule.unlock_method = method;
        }
        if let Some(password) = self.password {
            rule.password = Some(password).filter(|password| !password.is_empty());
        }
        if let Some(minutes) = self.sport_minutes_required {
            rule.sport_minutes_required = minutes;
        }
        if let Some(allow) = self.allow_temporary_unlock {
            rule.allow_temporary_unlock = allow;
        }
        if let Some(minutes) = self.temporary_unlock_minutes {
            rule.temporary_unlock_minutes = minutes;
        }
        if let Some(strict) = self.strict_mode {
            rule.strict_mode = strict;
        }
        if let Some(active) = self.is_active {
            rule.is_active = active;
        }
    }
}

fn normalize_apps(apps: Vec<String>) -> Vec<String> {
    let mut normalized = Vec::with_capacity(apps.len());
    for app in apps {
        let app = app.trim();
        if !app.is_empty() && !normalized.iter().any(|known: &String| known == app) {
            normalized.push(app.to_string());
        }
    }
    normalized
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporaryUnlock {
    pub id: RecordId,
    pub rule_id: RecordId,
    /// `None` unlocks every app of the rule.
    pub app_name: Option<String>,
    pub unlocked_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl TemporaryUnlock {
    pub fn grant(rule: &BlockRule, app_name: Option<String>, now: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id: rule.id,
            app_name: app_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            unlocked_at: now,
            expires_at: now + Duration::minutes(i64::from(rule.temporary_unlock_minutes)),
        }
    }

    pub fn is_active_at(&self, now: NaiveDateTime) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockerStatus {
    pub is_blocking: bool,
    /// Password-free copies of the rules currently blocking.
    pub active_rules: Vec<BlockRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SportVerification {
    pub verified: bool,
    pub minutes_done: u64,
    pub minutes_required: u32,
}
