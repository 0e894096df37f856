//! Single-user profile with goals and tracking preferences.
//!
//! # Invariants
//! - Exactly one profile exists; reads create it with defaults on demand.
//! - Goal and settings blobs tolerate missing keys by falling back to
//!   defaults, so older stored JSON keeps loading after new fields appear.

use crate::model::calendar::Language;
use crate::model::{require_optional_non_negative, ValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Diverse,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Diverse => "diverse",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            "diverse" => Some(Self::Diverse),
            _ => None,
        }
    }
}

/// Daily intake targets. Masses in grams, water in millilitres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NutrientGoals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
    pub sugar: f64,
    pub salt: f64,
    pub water: f64,
}

impl Default for NutrientGoals {
    fn default() -> Self {
        Self {
            calories: 2000.0,
            protein: 50.0,
            carbs: 250.0,
            fat: 65.0,
            fiber: 25.0,
            sugar: 50.0,
            salt: 6.0,
            water: 2000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitalGoals {
    /// Kilograms.
    pub target_weight: Option<f64>,
    /// Percent.
    pub target_body_fat: Option<f64>,
    pub sleep_hours: f64,
    pub resting_heart_rate: u32,
}

impl Default for VitalGoals {
    fn default() -> Self {
        Self {
            target_weight: None,
            target_body_fat: None,
            sleep_hours: 8.0,
            resting_heart_rate: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SportGoals {
    pub daily_steps: u32,
    pub weekly_workouts: u32,
    /// Free-form user goals (e.g. pace or lift targets), stored verbatim.
    pub custom_goals: Vec<Value>,
}

impl Default for SportGoals {
    fn default() -> Self {
        Self {
            daily_steps: 10_000,
            weekly_workouts: 3,
            custom_goals: Vec::new(),
        }
    }
}

/// Which metrics the shell shows and asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    pub track_calories: bool,
    pub track_protein: bool,
    pub track_carbs: bool,
    pub track_fat: bool,
    pub track_fiber: bool,
    pub track_sugar: bool,
    pub track_salt: bool,
    pub track_water: bool,
    pub track_weight: bool,
    pub track_body_fat: bool,
    pub track_sleep: bool,
    pub track_sleep_quality: bool,
    pub track_morning_energy: bool,
    pub track_resting_heart_rate: bool,
    pub track_bmr_neat: bool,
    pub track_steps: bool,
    pub track_workouts: bool,
    pub track_calories_burned: bool,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            track_calories: true,
            track_protein: true,
            track_carbs: true,
            track_fat: true,
            track_fiber: false,
            track_sugar: false,
            track_salt: false,
            track_water: true,
            track_weight: true,
            track_body_fat: false,
            track_sleep: true,
            track_sleep_quality: false,
            track_morning_energy: false,
            track_resting_heart_rate: false,
            track_bmr_neat: true,
            track_steps: true,
            track_workouts: true,
            track_calories_burned: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub birth_date: Option<NaiveDate>,
    /// Centimetres.
    pub height: Option<f64>,
    pub gender: Option<Gender>,
    pub language: Language,
    /// Free-text goal handed to the AI goal advisor.
    pub overall_goal: Option<String>,
    pub nutrient_goals: NutrientGoals,
    pub vital_goals: VitalGoals,
    pub sport_goals: SportGoals,
    pub tracking_settings: TrackingSettings,
    /// Unix epoch milliseconds of the last write.
    pub updated_at: i64,
}

impl Profile {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_optional_non_negative("height", self.height)?;
        require_optional_non_negative("vital_goals.target_weight", self.vital_goals.target_weight)?;
        require_optional_non_negative(
            "vital_goals.target_body_fat",
            self.vital_goals.target_body_fat,
        )?;
        let goals = &self.nutrient_goals;
        for (field, value) in [
            ("nutrient_goals.calories", goals.calories),
            ("nutrient_goals.protein", goals.protein),
            ("nutrient_goals.carbs", goals.carbs),
            ("nutrient_goals.fat", goals.fat),
            ("nutrient_goals.fiber", goals.fiber),
            ("nutrient_goals.sugar", goals.sugar),
            ("nutrient_goals.salt", goals.salt),
            ("nutrient_goals.water", goals.water),
        ] {
            require_optional_non_negative(field, Some(value))?;
        }
        Ok(())
    }
}

/// Partial profile update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    pub birth_date: Option<NaiveDate>,
    pub height: Option<f64>,
    pub gender: Option<Gender>,
    pub language: Option<Language>,
    pub overall_goal: Option<String>,
    pub nutrient_goals: Option<NutrientGoals>,
    pub vital_goals: Option<VitalGoals>,
    pub sport_goals: Option<SportGoals>,
    pub tracking_settings: Option<TrackingSettings>,
}

impl ProfileUpdate {
    pub fn apply_to(self, profile: &mut Profile) {
        if let Some(value) = self.birth_date {
            profile.birth_date = Some(value);
        }
        if let Some(value) = self.height {
            profile.height = Some(value);
        }
        if let Some(value) = self.gender {
            profile.gender = Some(value);
        }
        if let Some(value) = self.language {
            profile.language = value;
        }
        if let Some(value) = self.overall_goal {
            profile.overall_goal = Some(value);
        }
        if let Some(value) = self.nutrient_goals {
            profile.nutrient_goals = value;
        }
        if let Some(value) = self.vital_goals {
            profile.vital_goals = value;
        }
        if let Some(value) = self.sport_goals {
            profile.sport_goals = value;
        }
        if let Some(value) = self.tracking_settings {
            profile.tracking_settings = value;
        }
    }
}
