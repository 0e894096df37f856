//! CSV export of the logged data.
//!
//! # Invariants
//! - Fields are separated by `;`; fields containing `;`, quotes or line
//!   breaks are quoted.
//! - Headers are German and stable; absent values render as empty fields.
//! - The default range is the 30 days before `today` through `today`.

use crate::model::calendar::format_date;
use crate::model::finance::EntryFilter;
use crate::model::{RecordId, ValidationError};
use crate::repo::Repositories;
use crate::service::{ServiceError, ServiceResult};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_EXPORT_DAYS: i64 = 30;

const NUTRITION_HEADER: [&str; 11] = [
    "Datum",
    "Uhrzeit",
    "Beschreibung",
    "Kalorien",
    "Protein",
    "Kohlenhydrate",
    "Fett",
    "Ballaststoffe",
    "Zucker",
    "Salz",
    "Wasser",
];
const VITALS_HEADER: [&str; 9] = [
    "Datum",
    "Gewicht",
    "Korperfett",
    "Schlafbeginn",
    "Schlafende",
    "Schlafdauer",
    "Schlafqualitat",
    "Morgenenergie",
    "Ruhepuls",
];
const SPORT_HEADER: [&str; 5] = [
    "Datum",
    "Schritte",
    "Verbrannte Kalorien",
    "Trainings",
    "Trainingsminuten",
];
const FINANCE_HEADER: [&str; 4] = ["Datum", "Kategorie", "Beschreibung", "Betrag"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportCounts {
    pub nutrition: usize,
    pub vitals: usize,
    pub sport: usize,
    pub finance: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub nutrition_csv: String,
    pub vitals_csv: String,
    pub sport_csv: String,
    pub finance_csv: String,
    pub counts: ExportCounts,
}

pub struct ExportService<'a, 'conn> {
    repos: &'a Repositories<'conn>,
}

impl<'a, 'conn> ExportService<'a, 'conn> {
    pub fn new(repos: &'a Repositories<'conn>) -> Self {
        Self { repos }
    }

    /// Renders every table within `start..=end`.
    ///
    /// # Contract
    /// - Missing bounds default to `today - 30 days` and `today`.
    /// - Swapped bounds are rejected.
    pub fn export(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> ServiceResult<ExportBundle> {
        let end = end.unwrap_or(today);
        let start = start.unwrap_or(today - Duration::days(DEFAULT_EXPORT_DAYS));
        if start > end {
            return Err(ValidationError::Inconsistent(
                "export start date must not be after end date",
            )
            .into());
        }

        let nutrition = self.repos.nutrition.list_range(start, end)?;
        let vitals = self.repos.vitals.list_range(start, end)?;
        let sport = self.repos.sport.list_range(start, end)?;
        let finance = self
            .repos
            .finance
            .list_entries(&EntryFilter::range(start, end))?;
        let category_names: HashMap<RecordId, String> = self
            .repos
            .finance
            .list_categories()?
            .into_iter()
            .map(|category| (category.id, category.name))
            .collect();

        let nutrition_csv = render(
            &NUTRITION_HEADER,
            nutrition.iter().map(|entry| {
                let n = &entry.nutrients;
                vec![
                    format_date(entry.date),
                    entry.time.format("%H:%M").to_string(),
                    entry.description.clone(),
                    n.calories.to_string(),
                    n.protein.to_string(),
                    n.carbs.to_string(),
                    n.fat.to_string(),
                    n.fiber.to_string(),
                    n.sugar.to_string(),
                    n.salt.to_string(),
                    n.water.to_string(),
                ]
            }),
        )?;

        let vitals_csv = render(
            &VITALS_HEADER,
            vitals.iter().map(|entry| {
                vec![
                    format_date(entry.date),
                    optional(entry.weight),
                    optional(entry.body_fat),
                    optional(entry.sleep_start.map(|time| time.format("%H:%M"))),
                    optional(entry.sleep_end.map(|time| time.format("%H:%M"))),
                    optional(entry.sleep_duration),
                    optional(entry.sleep_quality),
                    optional(entry.morning_energy),
                    optional(entry.resting_heart_rate),
                ]
            }),
        )?;

        let sport_csv = render(
            &SPORT_HEADER,
            sport.iter().map(|day| {
                vec![
                    format_date(day.date),
                    day.steps.to_string(),
                    day.calories_burned.to_string(),
                    day.workouts.len().to_string(),
                    day.workout_minutes().to_string(),
                ]
            }),
        )?;

        let finance_csv = render(
            &FINANCE_HEADER,
            finance.iter().map(|entry| {
                vec![
                    format_date(entry.date),
                    category_names
                        .get(&entry.category_id)
                        .cloned()
                        .unwrap_or_default(),
                    entry.description.clone(),
                    format!("{:.2}", entry.amount),
                ]
            }),
        )?;

        Ok(ExportBundle {
            start_date: start,
            end_date: end,
            nutrition_csv,
            vitals_csv,
            sport_csv,
            finance_csv,
            counts: ExportCounts {
                nutrition: nutrition.len(),
                vitals: vitals.len(),
                sport: sport.len(),
                finance: finance.len(),
            },
        })
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

fn render(
    header: &[&str],
    rows: impl Iterator<Item = Vec<String>>,
) -> ServiceResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ServiceError::Csv(csv::Error::from(err.into_error())))?;
    String::from_utf8(bytes).map_err(|_| ServiceError::InconsistentState("csv output is not utf-8"))
}

#[cfg(test)]
mod tests {
    use super::{render, ExportService};
    use crate::db::open_db_in_memory;
    use crate::model::finance::{CategoryInput, FinanceEntryInput};
    use crate::model::nutrition::{NutritionInput, Nutrients};
    use crate::model::vitals::VitalInput;
    use crate::repo::Repositories;
    use crate::service::{FinanceService, NutritionService, ServiceError, VitalsService};
    use chrono::{NaiveDate, NaiveTime};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, d).unwrap()
    }

    #[test]
    fn fields_with_separator_are_quoted() {
        let csv = render(
            &["Datum", "Beschreibung"],
            vec![vec!["2025-08-01".to_string(), "Brot; Butter".to_string()]].into_iter(),
        )
        .unwrap();
        assert_eq!(csv, "Datum;Beschreibung\n2025-08-01;\"Brot; Butter\"\n");
    }

    #[test]
    fn export_renders_rows_in_range() {
        let conn = open_db_in_memory().unwrap();
        let repos = Repositories::sqlite(&conn).unwrap();
        let nutrition = NutritionService::new(&*repos.nutrition);
        for d in [1, 5, 20] {
            nutrition
                .create_entry(
                    NutritionInput {
                        date: day(d),
                        time: NaiveTime::from_hms_opt(8, 30, 0),
                        description: "Haferflocken".to_string(),
                        nutrients: Nutrients {
                            calories: 350.0,
                            protein: 12.5,
                            ..Nutrients::default()
                        },
                        ai_estimated: false,
                    },
                    NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
                )
                .unwrap();
        }
        let mut vitals = VitalInput::new(day(5));
        vitals.weight = Some(72.4);
        VitalsService::new(&*repos.vitals, &*repos.profile)
            .upsert_vitals(vitals)
            .unwrap();
        let finance = FinanceService::new(&*repos.finance);
        let category = finance
            .create_category(CategoryInput::new("Lebensmittel", 200.0))
            .unwrap();
        finance
            .create_entry(FinanceEntryInput {
                category_id: category.id,
                date: day(6),
                description: "Markt".to_string(),
                amount: 23.9,
            })
            .unwrap();

        let bundle = ExportService::new(&repos)
            .export(Some(day(1)), Some(day(10)), day(10))
            .unwrap();
        assert_eq!(bundle.counts.nutrition, 2);
        assert_eq!(bundle.counts.vitals, 1);
        assert_eq!(bundle.counts.finance, 1);

        let mut lines = bundle.nutrition_csv.lines();
        assert_eq!(
            lines.next(),
            Some("Datum;Uhrzeit;Beschreibung;Kalorien;Protein;Kohlenhydrate;Fett;Ballaststoffe;Zucker;Salz;Wasser")
        );
        assert_eq!(
            lines.next(),
            Some("2025-08-01;08:30;Haferflocken;350;12.5;0;0;0;0;0;0")
        );
        assert!(bundle.vitals_csv.contains("2025-08-05;72.4;;;;;;;"));
        assert!(bundle.finance_csv.contains("2025-08-06;Lebensmittel;Markt;23.90"));
        assert_eq!(bundle.sport_csv.lines().count(), 1);
    }

    #[test]
    fn default_range_is_last_thirty_days() {
        let conn = open_db_in_memory().unwrap();
        let repos = Repositories::sqlite(&conn).unwrap();
        let bundle = ExportService::new(&repos)
            .export(None, None, day(31))
            .unwrap();
        assert_eq!(bundle.start_date, day(1));
        assert_eq!(bundle.end_date, day(31));

        let error = ExportService::new(&repos)
            .export(Some(day(9)), Some(day(2)), day(31))
            .unwrap_err();
        assert!(matches!(error, ServiceError::Validation(_)));
    }
}
