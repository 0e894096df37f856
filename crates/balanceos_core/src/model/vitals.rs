//! Daily vital snapshot (body composition, sleep, heart rate, energy).
//!
//! # Invariants
//! - At most one entry per date.
//! - `sleep_duration`, `basal_metabolic_rate` and `neat` are derived by the
//!   vitals service, never accepted from input.
//! - An entry with `manual_override` is not overwritten by wearable syncs or
//!   by non-override input.

use crate::model::calendar::hhmm_option;
use crate::model::{require_in_range, require_optional_non_negative, RecordId, ValidationError};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Where a per-day record came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    #[default]
    Manual,
    Fitbit,
    /// Synthesized on read from an earlier day; never stored.
    CarriedOver,
}

impl EntrySource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Fitbit => "fitbit",
            Self::CarriedOver => "carried_over",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(Self::Manual),
            "fitbit" => Some(Self::Fitbit),
            "carried_over" => Some(Self::CarriedOver),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalEntry {
    /// `None` for entries that are not stored (empty or carried over).
    pub id: Option<RecordId>,
    pub date: NaiveDate,
    /// Kilograms.
    pub weight: Option<f64>,
    /// Percent.
    pub body_fat: Option<f64>,
    #[serde(default, with = "hhmm_option")]
    pub sleep_start: Option<NaiveTime>,
    #[serde(default, with = "hhmm_option")]
    pub sleep_end: Option<NaiveTime>,
    /// Hours, one decimal.
    pub sleep_duration: Option<f64>,
    /// 1-10.
    pub sleep_quality: Option<u8>,
    /// 1-10.
    pub morning_energy: Option<u8>,
    pub resting_heart_rate: Option<u32>,
    /// kcal/day.
    pub basal_metabolic_rate: Option<i64>,
    /// kcal/day.
    pub neat: Option<i64>,
    pub manual_override: bool,
    pub source: EntrySource,
}

impl VitalEntry {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            ..Self::default()
        }
    }

    /// Builds a read-only placeholder for `date` that keeps body composition
    /// from an earlier day.
    pub fn carried_over(date: NaiveDate, previous: &VitalEntry) -> Self {
        Self {
            date,
            weight: previous.weight,
            body_fat: previous.body_fat,
            source: EntrySource::CarriedOver,
            ..Self::default()
        }
    }

    pub fn is_stored(&self) -> bool {
        self.id.is_some()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_vital_fields(
            self.weight,
            self.body_fat,
            self.sleep_quality,
            self.morning_energy,
            self.resting_heart_rate,
        )
    }
}

/// Manual vitals input for one date. Absent fields keep stored values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalInput {
    pub date: NaiveDate,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub body_fat: Option<f64>,
    #[serde(default, with = "hhmm_option")]
    pub sleep_start: Option<NaiveTime>,
    #[serde(default, with = "hhmm_option")]
    pub sleep_end: Option<NaiveTime>,
    #[serde(default)]
    pub sleep_quality: Option<u8>,
    #[serde(default)]
    pub morning_energy: Option<u8>,
    #[serde(default)]
    pub resting_heart_rate: Option<u32>,
    #[serde(default = "default_manual_override")]
    pub manual_override: bool,
}

fn default_manual_override() -> bool {
    true
}

impl VitalInput {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            weight: None,
            body_fat: None,
            sleep_start: None,
            sleep_end: None,
            sleep_quality: None,
            morning_energy: None,
            resting_heart_rate: None,
            manual_override: true,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_vital_fields(
            self.weight,
            self.body_fat,
            self.sleep_quality,
            self.morning_energy,
            self.resting_heart_rate,
        )
    }

    /// Copies every present field onto `entry`.
    pub fn merge_into(&self, entry: &mut VitalEntry) {
        if self.weight.is_some() {
            entry.weight = self.weight;
        }
        if self.body_fat.is_some() {
            entry.body_fat = self.body_fat;
        }
        if self.sleep_start.is_some() {
            entry.sleep_start = self.sleep_start;
        }
        if self.sleep_end.is_some() {
            entry.sleep_end = self.sleep_end;
        }
        if self.sleep_quality.is_some() {
            entry.sleep_quality = self.sleep_quality;
        }
        if self.morning_energy.is_some() {
            entry.morning_energy = self.morning_energy;
        }
        if self.resting_heart_rate.is_some() {
            entry.resting_heart_rate = self.resting_heart_rate;
        }
    }
}

fn validate_vital_fields(
    weight: Option<f64>,
    body_fat: Option<f64>,
    sleep_quality: Option<u8>,
    morning_energy: Option<u8>,
    resting_heart_rate: Option<u32>,
) -> Result<(), ValidationError> {
    require_optional_non_negative("weight", weight)?;
    require_optional_non_negative("body_fat", body_fat)?;
    if let Some(body_fat) = body_fat {
        if body_fat >= 100.0 {
            return Err(ValidationError::Inconsistent("body_fat must be below 100%"));
        }
    }
    if let Some(value) = sleep_quality {
        require_in_range("sleep_quality", i64::from(value), 1, 10)?;
    }
    if let Some(value) = morning_energy {
        require_in_range("morning_energy", i64::from(value), 1, 10)?;
    }
    if let Some(value) = resting_heart_rate {
        require_in_range("resting_heart_rate", i64::from(value), 20, 250)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{EntrySource, VitalEntry, VitalInput};
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()
    }

    #[test]
    fn input_defaults_to_manual_override() {
        let input: VitalInput = serde_json::from_str(r#"{"date": "2025-05-01"}"#).unwrap();
        assert!(input.manual_override);
        assert_eq!(input.weight, None);
    }

    #[test]
    fn merge_keeps_fields_absent_from_input() {
        let mut entry = VitalEntry {
            weight: Some(80.0),
            resting_heart_rate: Some(58),
            ..VitalEntry::empty(date())
        };
        let input = VitalInput {
            body_fat: Some(18.5),
            ..VitalInput::new(date())
        };
        input.merge_into(&mut entry);
        assert_eq!(entry.weight, Some(80.0));
        assert_eq!(entry.body_fat, Some(18.5));
        assert_eq!(entry.resting_heart_rate, Some(58));
    }

    #[test]
    fn ratings_outside_one_to_ten_are_rejected() {
        let input = VitalInput {
            sleep_quality: Some(11),
            ..VitalInput::new(date())
        };
        assert!(input.validate().is_err());

        let input = VitalInput {
            morning_energy: Some(0),
            ..VitalInput::new(date())
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn carried_over_keeps_only_body_composition() {
        let previous = VitalEntry {
            weight: Some(72.3),
            body_fat: Some(15.0),
            sleep_duration: Some(7.5),
            ..VitalEntry::empty(date())
        };
        let next = date().succ_opt().unwrap();
        let carried = VitalEntry::carried_over(next, &previous);
        assert_eq!(carried.date, next);
        assert_eq!(carried.weight, Some(72.3));
        assert_eq!(carried.sleep_duration, None);
        assert_eq!(carried.source, EntrySource::CarriedOver);
        assert!(!carried.is_stored());
    }
}
