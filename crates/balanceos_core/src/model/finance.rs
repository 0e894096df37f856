//! Budget categories and spending entries.

use crate::model::{require_non_negative, require_text, RecordId, ValidationError};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CATEGORY_COLOR: &str = "#4CAF50";

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#(?:[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").expect("color regex is valid")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetRhythm {
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl BudgetRhythm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceCategory {
    pub id: RecordId,
    pub name: String,
    pub budget: f64,
    pub rhythm: BudgetRhythm,
    /// `#RRGGBB` or `#RRGGBBAA`.
    pub color: String,
}

impl FinanceCategory {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_non_negative("budget", self.budget)?;
        validate_color(&self.color)
    }
}

fn validate_color(color: &str) -> Result<(), ValidationError> {
    if !HEX_COLOR.is_match(color.trim()) {
        return Err(ValidationError::Inconsistent(
            "color must be a hex value like #4CAF50",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub budget: f64,
    #[serde(default)]
    pub rhythm: BudgetRhythm,
    #[serde(default)]
    pub color: Option<String>,
}

impl CategoryInput {
    pub fn new(name: impl Into<String>, budget: f64) -> Self {
        Self {
            name: name.into(),
            budget,
            rhythm: BudgetRhythm::default(),
            color: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_non_negative("budget", self.budget)?;
        match &self.color {
            Some(color) => validate_color(color),
            None => Ok(()),
        }
    }

    pub fn into_category(self, id: RecordId) -> FinanceCategory {
        FinanceCategory {
            id,
            name: self.name.trim().to_string(),
            budget: self.budget,
            rhythm: self.rhythm,
            color: self
                .color
                .map(|color| color.trim().to_string())
                .unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string()),
        }
    }

    pub fn into_new_category(self) -> FinanceCategory {
        self.into_category(Uuid::new_v4())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceEntry {
    pub id: RecordId,
    pub category_id: RecordId,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
}

impl FinanceEntry {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_negative("amount", self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceEntryInput {
    pub category_id: RecordId,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: String,
    pub amount: f64,
}

impl FinanceEntryInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_negative("amount", self.amount)
    }

    pub fn into_entry(self) -> FinanceEntry {
        FinanceEntry {
            id: Uuid::new_v4(),
            category_id: self.category_id,
            date: self.date,
            description: self.description.trim().to_string(),
            amount: self.amount,
        }
    }
}

/// Optional filters for listing entries; all bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryFilter {
    pub category_id: Option<RecordId>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl EntryFilter {
    pub fn category(category_id: RecordId) -> Self {
        Self {
            category_id: Some(category_id),
            ..Self::default()
        }
    }

    pub fn range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            category_id: None,
            start: Some(start),
            end: Some(end),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: FinanceCategory,
    pub entries: Vec<FinanceEntry>,
    pub total_spent: f64,
    /// Negative when the budget is exceeded.
    pub budget_remaining: f64,
}

impl CategorySummary {
    pub fn new(category: FinanceCategory, entries: Vec<FinanceEntry>) -> Self {
        let total_spent = entries.iter().map(|entry| entry.amount).sum::<f64>();
        let budget_remaining = category.budget - total_spent;
        Self {
            category,
            entries,
            total_spent,
            budget_remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BudgetRhythm, CategoryInput, CategorySummary, FinanceEntryInput, DEFAULT_CATEGORY_COLOR};
    use chrono::NaiveDate;

    #[test]
    fn category_defaults_to_monthly_green() {
        let input: CategoryInput = serde_json::from_str(r#"{"name": "Lebensmittel"}"#).unwrap();
        let category = input.into_new_category();
        assert_eq!(category.rhythm, BudgetRhythm::Monthly);
        assert_eq!(category.color, DEFAULT_CATEGORY_COLOR);
        assert_eq!(category.budget, 0.0);
    }

    #[test]
    fn invalid_color_is_rejected() {
        let mut input = CategoryInput::new("Freizeit", 100.0);
        input.color = Some("green".to_string());
        assert!(input.validate().is_err());
        input.color = Some("#ff8800".to_string());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn summary_reports_overspending_as_negative_remaining() {
        let category = CategoryInput::new("Essen gehen", 50.0).into_new_category();
        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let entries = [30.0, 35.5]
            .into_iter()
            .map(|amount| {
                FinanceEntryInput {
                    category_id: category.id,
                    date,
                    description: String::new(),
                    amount,
                }
                .into_entry()
            })
            .collect();

        let summary = CategorySummary::new(category, entries);
        assert_eq!(summary.total_spent, 65.5);
        assert_eq!(summary.budget_remaining, -15.5);
    }
}
