//! Domain model for tracked health, sport, finance and focus records.
//!
//! # Responsibility
//! - Define the records persisted by repositories and returned by services.
//! - Own field-level validation so every write path shares one rule set.
//!
//! # Invariants
//! - Every stored record is identified by a stable `RecordId`.
//! - Per-day aggregates (vitals, sport) are unique per calendar date.
//! - Quantities are never negative once validated.

use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod blocker;
pub mod calendar;
pub mod finance;
pub mod notification;
pub mod nutrition;
pub mod profile;
pub mod sport;
pub mod vitals;

/// Stable identifier for every stored record.
pub type RecordId = Uuid;

/// Field-level validation failure raised before any persistence happens.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Required text field is empty after trimming.
    EmptyField(&'static str),
    /// Quantity must be zero or positive (and finite).
    NegativeValue { field: &'static str, value: f64 },
    /// Integer value outside its inclusive range.
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    /// Field combination is inconsistent (e.g. password unlock without password).
    Inconsistent(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "{field} must not be empty"),
            Self::NegativeValue { field, value } => {
                write!(f, "{field} must be a non-negative number, got {value}")
            }
            Self::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{field} must be within {min}..={max}, got {value}"),
            Self::Inconsistent(details) => write!(f, "{details}"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}

pub(crate) fn require_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::NegativeValue { field, value });
    }
    Ok(())
}

pub(crate) fn require_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    match value {
        Some(value) => require_non_negative(field, value),
        None => Ok(()),
    }
}

pub(crate) fn require_in_range(
    field: &'static str,
    value: i64,
    min: i64,
    max: i64,
) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}
