//! Scheduled local reminders.

use crate::model::calendar::{hhmm, hhmm_option, truncate_to_minute, DayOfWeek};
use crate::model::{require_text, RecordId, ValidationError};
use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[default]
    Reminder,
    Motivation,
    Custom,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::Motivation => "motivation",
            Self::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "reminder" => Some(Self::Reminder),
            "motivation" => Some(Self::Motivation),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: RecordId,
    pub title: String,
    pub message: String,
    #[serde(with = "hhmm")]
    pub schedule_time: NaiveTime,
    /// Empty means daily.
    pub schedule_days: Vec<DayOfWeek>,
    #[serde(rename = "notification_type")]
    pub kind: NotificationKind,
    pub is_active: bool,
}

impl Notification {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)
    }

    /// Whether an active notification fires at `now` (minute precision).
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        if !self.is_active {
            return false;
        }
        let day = DayOfWeek::of(now.date());
        let day_matches = self.schedule_days.is_empty() || self.schedule_days.contains(&day);
        day_matches && truncate_to_minute(now.time()) == self.schedule_time
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationInput {
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(with = "hhmm")]
    pub schedule_time: NaiveTime,
    #[serde(default)]
    pub schedule_days: Vec<DayOfWeek>,
    #[serde(default, rename = "notification_type")]
    pub kind: NotificationKind,
}

impl NotificationInput {
    pub fn into_notification(self) -> Result<Notification, ValidationError> {
        let notification = Notification {
            id: Uuid::new_v4(),
            title: self.title.trim().to_string(),
            message: self.message.trim().to_string(),
            schedule_time: self.schedule_time,
            schedule_days: dedup_days(self.schedule_days),
            kind: self.kind,
            is_active: true,
        };
        notification.validate()?;
        Ok(notification)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPatch {
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(with = "hhmm_option")]
    pub schedule_time: Option<NaiveTime>,
    pub schedule_days: Option<Vec<DayOfWeek>>,
    #[serde(rename = "notification_type")]
    pub kind: Option<NotificationKind>,
    pub is_active: Option<bool>,
}

impl NotificationPatch {
    pub fn apply_to(self, notification: &mut Notification) {
        if let Some(title) = self.title {
            notification.title = title.trim().to_string();
        }
        if let Some(message) = self.message {
            notification.message = message.trim().to_string();
        }
        if let Some(time) = self.schedule_time {
            notification.schedule_time = time;
        }
        if let Some(days) = self.schedule_days {
            notification.schedule_days = dedup_days(days);
        }
        if let Some(kind) = self.kind {
            notification.kind = kind;
        }
        if let Some(active) = self.is_active {
            notification.is_active = active;
        }
    }
}

fn dedup_days(mut days: Vec<DayOfWeek>) -> Vec<DayOfWeek> {
    days.sort();
    days.dedup();
    days
}

#[cfg(test)]
mod tests {
    use super::{NotificationInput, NotificationKind, NotificationPatch};
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn input_defaults_to_daily_reminder() {
        let input: NotificationInput =
            serde_json::from_value(json!({"title": "Wasser trinken", "schedule_time": "10:00"}))
                .unwrap();
        let notification = input.into_notification().unwrap();
        assert_eq!(notification.kind, NotificationKind::Reminder);
        assert!(notification.schedule_days.is_empty());
        assert!(notification.is_active);

        let monday = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert!(notification.is_due(monday.and_hms_opt(10, 0, 45).unwrap()));
        assert!(!notification.is_due(monday.and_hms_opt(10, 1, 0).unwrap()));
    }

    #[test]
    fn patch_deactivates_and_retimes() {
        let input: NotificationInput = serde_json::from_value(json!({
            "title": "Dehnen",
            "schedule_time": "07:00",
            "schedule_days": ["friday", "monday", "friday"],
            "notification_type": "motivation"
        }))
        .unwrap();
        let mut notification = input.into_notification().unwrap();
        assert_eq!(notification.schedule_days.len(), 2);

        let patch: NotificationPatch =
            serde_json::from_value(json!({"schedule_time": "07:30", "is_active": false})).unwrap();
        patch.apply_to(&mut notification);
        assert_eq!(notification.schedule_time.to_string(), "07:30:00");
        assert!(!notification.is_active);
        assert_eq!(notification.title, "Dehnen");
    }

    #[test]
    fn blank_title_is_rejected() {
        let input: NotificationInput =
            serde_json::from_value(json!({"title": " ", "schedule_time": "08:00"})).unwrap();
        assert!(input.into_notification().is_err());
    }
}
