//! Meal/drink log entries and their nutrient quantities.

use crate::model::calendar::{hhmm, hhmm_option};
use crate::model::{require_non_negative, RecordId, ValidationError};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Nutrient quantities of one entry or of a daily total.
///
/// Calories in kcal, water in ml, everything else in grams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Nutrients {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
    pub sugar: f64,
    pub salt: f64,
    pub water: f64,
}

impl Nutrients {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_negative("calories", self.calories)?;
        require_non_negative("protein", self.protein)?;
        require_non_negative("carbs", self.carbs)?;
        require_non_negative("fat", self.fat)?;
        require_non_negative("fiber", self.fiber)?;
        require_non_negative("sugar", self.sugar)?;
        require_non_negative("salt", self.salt)?;
        require_non_negative("water", self.water)?;
        Ok(())
    }

    pub fn accumulate(&mut self, other: &Nutrients) {
        self.calories += other.calories;
        self.protein += other.protein;
        self.carbs += other.carbs;
        self.fat += other.fat;
        self.fiber += other.fiber;
        self.sugar += other.sugar;
        self.salt += other.salt;
        self.water += other.water;
    }

    pub fn sum<'a>(items: impl IntoIterator<Item = &'a Nutrients>) -> Nutrients {
        let mut total = Nutrients::default();
        for item in items {
            total.accumulate(item);
        }
        total
    }

    /// Divides every quantity by `days`; zero days yields zero.
    pub fn per_day(&self, days: usize) -> Nutrients {
        if days == 0 {
            return Nutrients::default();
        }
        let divisor = days as f64;
        Nutrients {
            calories: self.calories / divisor,
            protein: self.protein / divisor,
            carbs: self.carbs / divisor,
            fat: self.fat / divisor,
            fiber: self.fiber / divisor,
            sugar: self.sugar / divisor,
            salt: self.salt / divisor,
            water: self.water / divisor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionEntry {
    pub id: RecordId,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub description: String,
    #[serde(flatten)]
    pub nutrients: Nutrients,
    /// Whether the quantities came from the AI estimator.
    pub ai_estimated: bool,
}

impl NutritionEntry {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.nutrients.validate()
    }
}

/// Create/update payload. Missing quantities default to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionInput {
    pub date: NaiveDate,
    /// Defaults to the current wall-clock time on create.
    #[serde(default, with = "hhmm_option")]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub nutrients: Nutrients,
    #[serde(default)]
    pub ai_estimated: bool,
}

impl NutritionInput {
    pub fn into_entry(self, fallback_time: NaiveTime) -> NutritionEntry {
        NutritionEntry {
            id: Uuid::new_v4(),
            date: self.date,
            time: self.time.unwrap_or(fallback_time),
            description: self.description.trim().to_string(),
            nutrients: self.nutrients,
            ai_estimated: self.ai_estimated,
        }
    }
}

/// Per-day totals over all entries of a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionSummary {
    pub date: NaiveDate,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub total_fiber: f64,
    pub total_sugar: f64,
    pub total_salt: f64,
    pub total_water: f64,
    pub entry_count: usize,
}

impl NutritionSummary {
    pub fn from_entries(date: NaiveDate, entries: &[NutritionEntry]) -> Self {
        let totals = Nutrients::sum(entries.iter().map(|entry| &entry.nutrients));
        Self {
            date,
            total_calories: totals.calories,
            total_protein: totals.protein,
            total_carbs: totals.carbs,
            total_fat: totals.fat,
            total_fiber: totals.fiber,
            total_sugar: totals.sugar,
            total_salt: totals.salt,
            total_water: totals.water,
            entry_count: entries.len(),
        }
    }

    pub fn totals(&self) -> Nutrients {
        Nutrients {
            calories: self.total_calories,
            protein: self.total_protein,
            carbs: self.total_carbs,
            fat: self.total_fat,
            fiber: self.total_fiber,
            sugar: self.total_sugar,
            salt: self.total_salt,
            water: self.total_water,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NutritionInput, NutritionSummary, Nutrients};
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn input_json_defaults_missing_quantities_and_time() {
        let input: NutritionInput =
            serde_json::from_str(r#"{"date": "2025-01-02", "description": "Apfel", "calories": 52}"#)
                .unwrap();
        assert_eq!(input.time, None);
        assert_eq!(input.nutrients.calories, 52.0);
        assert_eq!(input.nutrients.protein, 0.0);

        let fallback = NaiveTime::from_hms_opt(12, 15, 0).unwrap();
        let entry = input.into_entry(fallback);
        assert_eq!(entry.time, fallback);
        assert!(!entry.ai_estimated);
    }

    #[test]
    fn summary_sums_every_quantity() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let time = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let make = |calories: f64, water: f64| {
            NutritionInput {
                date,
                time: None,
                description: String::new(),
                nutrients: Nutrients {
                    calories,
                    water,
                    ..Nutrients::default()
                },
                ai_estimated: false,
            }
            .into_entry(time)
        };
        let entries = vec![make(300.0, 250.0), make(450.5, 0.0)];

        let summary = NutritionSummary::from_entries(date, &entries);
        assert_eq!(summary.entry_count, 2);
        assert_eq!(summary.total_calories, 750.5);
        assert_eq!(summary.totals().water, 250.0);
    }

    #[test]
    fn negative_quantities_are_rejected() {
        let nutrients = Nutrients {
            fat: -2.0,
            ..Nutrients::default()
        };
        assert!(nutrients.validate().is_err());
    }
}
