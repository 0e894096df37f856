//! Closed-form energy expenditure formulas.
//!
//! # Responsibility
//! - Estimate basal metabolic rate (BMR) and non-exercise activity
//!   thermogenesis (NEAT) from scalar body metrics.
//! - Derive sleep duration from wall-clock bed/wake times.
//!
//! # Invariants
//! - Every function is pure; callers pass the reference date explicitly.
//! - kcal results are whole numbers.

use crate::model::profile::Gender;
use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Fixed activity factor applied on top of BMR for NEAT.
pub const NEAT_ACTIVITY_FACTOR: f64 = 1.375;
/// kcal attributed to one step in daily analytics.
pub const KCAL_PER_STEP: f64 = 0.04;

const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BmrFormula {
    MifflinStJeor,
    KatchMcArdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BmrEstimate {
    pub kcal: i64,
    pub formula: BmrFormula,
}

/// Inputs a BMR estimate may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BmrInput {
    Weight,
    Height,
    BirthDate,
    Gender,
    BodyFat,
}

impl BmrInput {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weight => "weight",
            Self::Height => "height",
            Self::BirthDate => "birth_date",
            Self::Gender => "gender",
            Self::BodyFat => "body_fat",
        }
    }
}

/// Neither formula could be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BmrUnavailable {
    /// Inputs missing for the Mifflin-St Jeor fallback.
    pub missing: Vec<BmrInput>,
}

impl Display for BmrUnavailable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.missing.iter().map(|input| input.as_str()).collect();
        write!(f, "bmr needs {}", names.join(", "))
    }
}

impl Error for BmrUnavailable {}

/// Body metrics available on a given day.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BodyMetrics {
    pub weight: Option<f64>,
    pub body_fat: Option<f64>,
    pub height: Option<f64>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

/// Whole years between `birth_date` and `today`; `None` when born in the future.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> Option<u32> {
    today.years_since(birth_date)
}

/// `10w + 6.25h - 5a + 5` for male/diverse, `- 161` for female.
pub fn mifflin_st_jeor(weight_kg: f64, height_cm: f64, age: u32, gender: Gender) -> i64 {
    let offset = match gender {
        Gender::Female => -161.0,
        Gender::Male | Gender::Diverse => 5.0,
    };
    (10.0 * weight_kg + 6.25 * height_cm - 5.0 * f64::from(age) + offset).round() as i64
}

/// `370 + 21.6 * LBM` with lean body mass `w * (1 - bf/100)`.
pub fn katch_mcardle(weight_kg: f64, body_fat_pct: f64) -> i64 {
    let lean_body_mass = weight_kg * (1.0 - body_fat_pct / 100.0);
    (370.0 + 21.6 * lean_body_mass).round() as i64
}

/// Katch-McArdle when body fat is known, Mifflin-St Jeor otherwise.
pub fn best_bmr(metrics: &BodyMetrics, today: NaiveDate) -> Result<BmrEstimate, BmrUnavailable> {
    let weight = positive(metrics.weight);
    if let (Some(weight), Some(body_fat)) = (weight, positive(metrics.body_fat)) {
        return Ok(BmrEstimate {
            kcal: katch_mcardle(weight, body_fat),
            formula: BmrFormula::KatchMcArdle,
        });
    }

    let height = positive(metrics.height);
    let age = metrics
        .birth_date
        .and_then(|birth_date| age_on(birth_date, today))
        .filter(|age| *age > 0);

    match (weight, height, age, metrics.gender) {
        (Some(weight), Some(height), Some(age), Some(gender)) => Ok(BmrEstimate {
            kcal: mifflin_st_jeor(weight, height, age, gender),
            formula: BmrFormula::MifflinStJeor,
        }),
        _ => {
            let mut missing = Vec::new();
            if weight.is_none() {
                missing.push(BmrInput::Weight);
            }
            if height.is_none() {
                missing.push(BmrInput::Height);
            }
            if age.is_none() {
                missing.push(BmrInput::BirthDate);
            }
            if metrics.gender.is_none() {
                missing.push(BmrInput::Gender);
            }
            Err(BmrUnavailable { missing })
        }
    }
}

/// `round(bmr * 1.375 - bmr)`.
pub fn neat_from_bmr(bmr: i64) -> i64 {
    let bmr = bmr as f64;
    (bmr * NEAT_ACTIVITY_FACTOR - bmr).round() as i64
}

/// Step-based daily expenditure `bmr + steps * 0.04`, truncated.
pub fn neat_from_steps(bmr: i64, steps: u32) -> i64 {
    (bmr as f64 + f64::from(steps) * KCAL_PER_STEP) as i64
}

/// Hours between bed time and wake time, one decimal. Wake time before bed
/// time means the night crossed midnight.
pub fn sleep_duration_hours(start: NaiveTime, end: NaiveTime) -> f64 {
    let start_minutes = start.hour() * 60 + start.minute();
    let end_minutes = end.hour() * 60 + end.minute();
    let minutes = if end_minutes < start_minutes {
        MINUTES_PER_DAY - start_minutes + end_minutes
    } else {
        end_minutes - start_minutes
    };
    round_to_tenth(f64::from(minutes) / 60.0)
}

pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|value| value.is_finite() && *value > 0.0)
}
