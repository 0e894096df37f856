//! Per-day activity record with its workouts and free-form metrics.
//!
//! # Invariants
//! - At most one sport day per date; workouts belong to exactly one day and
//!   disappear with it.
//! - `custom_metrics` is always a JSON object.

use crate::model::vitals::EntrySource;
use crate::model::{
    require_in_range, require_non_negative, require_optional_non_negative, require_text, RecordId,
    ValidationError,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A single workout cannot last longer than one day.
pub const MAX_WORKOUT_MINUTES: u32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: RecordId,
    /// Free-text activity type (running, cycling, gym, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Minutes.
    pub duration: u32,
    /// kcal.
    pub calories_burned: f64,
    /// Kilometres.
    pub distance: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutInput {
    /// Keeps an existing workout's id when a day is rewritten.
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(rename = "type")]
    pub kind: String,
    pub duration: u32,
    #[serde(default)]
    pub calories_burned: f64,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl WorkoutInput {
    pub fn new(kind: impl Into<String>, duration: u32) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            duration,
            calories_burned: 0.0,
            distance: None,
            notes: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_workout_fields(&self.kind, self.duration, self.calories_burned, self.distance)
    }

    pub fn into_workout(self) -> Workout {
        Workout {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            kind: self.kind.trim().to_string(),
            duration: self.duration,
            calories_burned: self.calories_burned,
            distance: self.distance,
            notes: self
                .notes
                .map(|notes| notes.trim().to_string())
                .filter(|notes| !notes.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SportDay {
    /// `None` until the day is stored.
    pub id: Option<RecordId>,
    pub date: NaiveDate,
    pub steps: u32,
    /// Active calories reported for the whole day (wearable or manual).
    pub calories_burned: f64,
    pub workouts: Vec<Workout>,
    pub custom_metrics: Map<String, Value>,
    pub manual_override: bool,
    pub source: EntrySource,
}

impl SportDay {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            ..Self::default()
        }
    }

    pub fn is_stored(&self) -> bool {
        self.id.is_some()
    }

    /// Summed in `u64` so rows written before the duration bound cannot overflow.
    pub fn workout_minutes(&self) -> u64 {
        self.workouts
            .iter()
            .map(|workout| u64::from(workout.duration))
            .sum()
    }

    pub fn workout_calories(&self) -> f64 {
        self.workouts
            .iter()
            .map(|workout| workout.calories_burned)
            .sum()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_negative("calories_burned", self.calories_burned)?;
        for workout in &self.workouts {
            validate_workout_fields(
                &workout.kind,
                workout.duration,
                workout.calories_burned,
                workout.distance,
            )?;
        }
        Ok(())
    }
}

fn validate_workout_fields(
    kind: &str,
    duration: u32,
    calories_burned: f64,
    distance: Option<f64>,
) -> Result<(), ValidationError> {
    require_text("type", kind)?;
    require_in_range(
        "duration",
        i64::from(duration),
        0,
        i64::from(MAX_WORKOUT_MINUTES),
    )?;
    require_non_negative("calories_burned", calories_burned)?;
    require_optional_non_negative("distance", distance)
}

/// Upsert payload for one sport day. Absent fields keep stored values; a
/// present `workouts` list replaces the stored one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SportInput {
    pub date: NaiveDate,
    #[serde(default)]
    pub steps: Option<u32>,
    #[serde(default)]
    pub calories_burned: Option<f64>,
    #[serde(default)]
    pub workouts: Option<Vec<WorkoutInput>>,
    #[serde(default)]
    pub custom_metrics: Option<Map<String, Value>>,
    #[serde(default = "default_manual_override")]
    pub manual_override: bool,
}

fn default_manual_override() -> bool {
    true
}

impl SportInput {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            steps: None,
            calories_burned: None,
            workouts: None,
            custom_metrics: None,
            manual_override: true,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_optional_non_negative("calories_burned", self.calories_burned)?;
        for workout in self.workouts.iter().flatten() {
            workout.validate()?;
        }
        Ok(())
    }

    pub fn merge_into(self, day: &mut SportDay) {
        if let Some(steps) = self.steps {
            day.steps = steps;
        }
        if let Some(calories) = self.calories_burned {
            day.calories_burned = calories;
        }
        if let Some(workouts) = self.workouts {
            day.workouts = workouts.into_iter().map(WorkoutInput::into_workout).collect();
        }
        if let Some(metrics) = self.custom_metrics {
            day.custom_metrics = metrics;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SportDay, SportInput, WorkoutInput, MAX_WORKOUT_MINUTES};
    use crate::model::ValidationError;
    use chrono::NaiveDate;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }

    #[test]
    fn workout_type_uses_wire_name() {
        let input: WorkoutInput =
            serde_json::from_value(json!({"type": "running", "duration": 42})).unwrap();
        let workout = input.into_workout();
        assert_eq!(workout.kind, "running");
        assert_eq!(workout.calories_burned, 0.0);

        let value = serde_json::to_value(&workout).unwrap();
        assert_eq!(value["type"], "running");
    }

    #[test]
    fn merge_replaces_workouts_only_when_present() {
        let mut day = SportDay::empty(date());
        let mut input = SportInput::new(date());
        input.workouts = Some(vec![WorkoutInput::new("gym", 30), WorkoutInput::new("walk", 20)]);
        input.merge_into(&mut day);
        assert_eq!(day.workout_minutes(), 50);

        let mut steps_only = SportInput::new(date());
        steps_only.steps = Some(8000);
        steps_only.merge_into(&mut day);
        assert_eq!(day.steps, 8000);
        assert_eq!(day.workouts.len(), 2);
    }

    #[test]
    fn blank_workout_type_is_rejected() {
        assert!(WorkoutInput::new("  ", 10).validate().is_err());
    }

    #[test]
    fn workout_longer_than_a_day_is_rejected() {
        assert!(WorkoutInput::new("hike", MAX_WORKOUT_MINUTES).validate().is_ok());
        assert!(matches!(
            WorkoutInput::new("hike", MAX_WORKOUT_MINUTES + 1).validate(),
            Err(ValidationError::OutOfRange { field: "duration", .. })
        ));

        let mut day = SportDay::empty(date());
        day.workouts.push(WorkoutInput::new("gym", u32::MAX).into_workout());
        assert!(day.validate().is_err());
    }

    #[test]
    fn huge_durations_sum_without_overflow() {
        let mut day = SportDay::empty(date());
        day.workouts.push(WorkoutInput::new("gym", u32::MAX).into_workout());
        day.workouts.push(WorkoutInput::new("walk", 1).into_workout());
        assert_eq!(day.workout_minutes(), u64::from(u32::MAX) + 1);
    }
}
