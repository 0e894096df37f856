//! Read-only analytics over nutrition, vitals and sport records.
//!
//! # Responsibility
//! - Daily report: intake against goals, energy expenditure, calorie
//!   balance, steps against goal.
//! - Weekly report: seven daily reports ending at a date.
//! - Period report (`today|month|all`): averages and progressions.
//! - Coaching: workout suggestions and the daily tip built from the daily
//!   report.
//!
//! # Invariants
//! - Nothing is written; missing records count as zero or `None`.
//! - Percentages are capped at 100 and rounded to one decimal.

use crate::energy::{neat_from_steps, round_to_tenth};
use crate::integration::{
    GoalAdvisor, TipContext, WorkoutContext, WorkoutSuggestion, FALLBACK_TIP,
};
use crate::model::calendar::days_back;
use crate::model::nutrition::{Nutrients, NutritionSummary};
use crate::model::sport::SportDay;
use crate::model::vitals::VitalEntry;
use crate::repo::Repositories;
use crate::service::{ServiceError, ServiceResult};
use chrono::{Duration, NaiveDate};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const WEEK_DAYS: u32 = 7;
pub const MONTH_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Today,
    /// From 30 days before today through today.
    Month,
    /// Everything since 2000-01-01.
    All,
}

impl Period {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "today" => Some(Self::Today),
            "month" => Some(Self::Month),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Month => "month",
            Self::All => "all",
        }
    }

    pub fn start_date(self, today: NaiveDate) -> NaiveDate {
        match self {
            Self::Today => today,
            Self::Month => today - Duration::days(MONTH_PERIOD_DAYS),
            Self::All => NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN),
        }
    }
}

/// Consumption of one nutrient against its goal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub consumed: f64,
    pub goal: f64,
    /// `goal - consumed`; negative once exceeded.
    pub remaining: f64,
    /// 0..=100.
    pub percent: f64,
}

impl GoalProgress {
    pub fn new(consumed: f64, goal: f64) -> Self {
        Self {
            consumed,
            goal,
            remaining: goal - consumed,
            percent: percent_of_goal(consumed, goal),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAnalytics {
    pub date: NaiveDate,
    pub nutrition: NutritionSummary,
    pub calories: GoalProgress,
    pub protein: GoalProgress,
    pub carbs: GoalProgress,
    pub fat: GoalProgress,
    pub water: GoalProgress,
    pub vitals: Option<VitalEntry>,
    pub sport: SportDay,
    /// From the day's own vitals entry.
    pub bmr: Option<i64>,
    /// BMR plus step calories; `None` unless the day has vitals with a BMR and a sport record.
    pub neat: Option<i64>,
    pub workout_calories: f64,
    /// BMR (0 when unknown) plus workout calories.
    pub calories_burned: f64,
    /// Consumed minus burned.
    pub calorie_balance: f64,
    pub steps: u32,
    pub steps_goal: u32,
    pub steps_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyAnalytics {
    /// Newest day first.
    pub days: Vec<DailyAnalytics>,
}

/// First and last recorded value within a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Progression {
    pub start: Option<f64>,
    pub end: Option<f64>,
    /// `end - start`, one decimal.
    pub change: Option<f64>,
}

impl Progression {
    fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut start = None;
        let mut end = None;
        for value in values {
            start.get_or_insert(value);
            end = Some(value);
        }
        let change = match (start, end) {
            (Some(start), Some(end)) => Some(round_to_tenth(end - start)),
            _ => None,
        };
        Self { start, end, change }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaysWithData {
    pub nutrition: usize,
    pub vitals: usize,
    pub sport: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodAnalytics {
    pub period: Period,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Per day with at least one nutrition entry.
    pub nutrition_averages: Nutrients,
    pub weight: Progression,
    pub body_fat: Progression,
    pub average_sleep_hours: Option<f64>,
    /// Per stored sport day.
    pub steps_per_day: f64,
    pub workout_calories_per_day: f64,
    pub total_workouts: usize,
    pub total_workout_minutes: u64,
    pub days_with_data: DaysWithData,
}

pub struct AnalyticsService<'a, 'conn> {
    repos: &'a Repositories<'conn>,
}

impl<'a, 'conn> AnalyticsService<'a, 'conn> {
    pub fn new(repos: &'a Repositories<'conn>) -> Self {
        Self { repos }
    }

    pub fn daily(&self, date: NaiveDate) -> ServiceResult<DailyAnalytics> {
        let profile = self.repos.profile.load_profile()?;
        let entries = self.repos.nutrition.list_by_date(date)?;
        let nutrition = NutritionSummary::from_entries(date, &entries);
        let vitals = self.repos.vitals.get_by_date(date)?;
        let stored_sport = self.repos.sport.get_by_date(date)?;

        // Only the day's own vitals count; nothing is carried over here.
        let bmr = vitals
            .as_ref()
            .and_then(|entry| entry.basal_metabolic_rate)
            .filter(|bmr| *bmr > 0);
        let neat = match (bmr, stored_sport.as_ref()) {
            (Some(bmr), Some(day)) => Some(neat_from_steps(bmr, day.steps)),
            _ => None,
        };
        let sport = stored_sport.unwrap_or_else(|| SportDay::empty(date));
        let workout_calories = sport.workout_calories();
        let calories_burned = bmr.unwrap_or(0) as f64 + workout_calories;

        let goals = &profile.nutrient_goals;
        let steps_goal = profile.sport_goals.daily_steps;
        Ok(DailyAnalytics {
            date,
            calories: GoalProgress::new(nutrition.total_calories, goals.calories),
            protein: GoalProgress::new(nutrition.total_protein, goals.protein),
            carbs: GoalProgress::new(nutrition.total_carbs, goals.carbs),
            fat: GoalProgress::new(nutrition.total_fat, goals.fat),
            water: GoalProgress::new(nutrition.total_water, goals.water),
            calorie_balance: nutrition.total_calories - calories_burned,
            nutrition,
            vitals,
            steps: sport.steps,
            steps_goal,
            steps_percent: percent_of_goal(f64::from(sport.steps), f64::from(steps_goal)),
            sport,
            bmr,
            neat,
            workout_calories,
            calories_burned,
        })
    }

    pub fn weekly(&self, end_date: NaiveDate) -> ServiceResult<WeeklyAnalytics> {
        let days = days_back(end_date, WEEK_DAYS)
            .into_iter()
            .map(|date| self.daily(date))
            .collect::<ServiceResult<Vec<_>>>()?;
        Ok(WeeklyAnalytics { days })
    }

    pub fn period(&self, period: Period, today: NaiveDate) -> ServiceResult<PeriodAnalytics> {
        let start = period.start_date(today);
        let nutrition = self.repos.nutrition.list_range(start, today)?;
        let vitals = self.repos.vitals.list_range(start, today)?;
        let sport = self.repos.sport.list_range(start, today)?;

        let nutrition_days: BTreeSet<NaiveDate> = nutrition.iter().map(|entry| entry.date).collect();
        let nutrition_totals = Nutrients::sum(nutrition.iter().map(|entry| &entry.nutrients));

        let sleep: Vec<f64> = vitals
            .iter()
            .filter_map(|entry| entry.sleep_duration)
            .filter(|hours| *hours > 0.0)
            .collect();
        let average_sleep_hours = if sleep.is_empty() {
            None
        } else {
            Some(round_to_tenth(sleep.iter().sum::<f64>() / sleep.len() as f64))
        };

        let sport_days = sport.len().max(1) as f64;
        let total_steps: u64 = sport.iter().map(|day| u64::from(day.steps)).sum();
        let workout_calories: f64 = sport.iter().map(SportDay::workout_calories).sum();

        Ok(PeriodAnalytics {
            period,
            start_date: start,
            end_date: today,
            nutrition_averages: nutrition_totals.per_day(nutrition_days.len().max(1)),
            weight: Progression::from_values(
                vitals.iter().filter_map(|entry| entry.weight).filter(|w| *w > 0.0),
            ),
            body_fat: Progression::from_values(
                vitals.iter().filter_map(|entry| entry.body_fat).filter(|bf| *bf > 0.0),
            ),
            average_sleep_hours,
            steps_per_day: total_steps as f64 / sport_days,
            workout_calories_per_day: workout_calories / sport_days,
            total_workouts: sport.iter().map(|day| day.workouts.len()).sum(),
            total_workout_minutes: sport.iter().map(SportDay::workout_minutes).sum(),
            days_with_data: DaysWithData {
                nutrition: nutrition_days.len(),
                vitals: vitals.len(),
                sport: sport.len(),
            },
        })
    }

    /// Asks the advisor for workouts fitting the state of `date`.
    pub fn workout_suggestions(
        &self,
        advisor: Option<&dyn GoalAdvisor>,
        date: NaiveDate,
    ) -> ServiceResult<Vec<WorkoutSuggestion>> {
        let advisor = advisor.ok_or(ServiceError::IntegrationDisabled("openai"))?;
        let daily = self.daily(date)?;
        let profile = self.repos.profile.load_profile()?;
        let weight = match daily.vitals.as_ref().and_then(|entry| entry.weight) {
            Some(weight) => Some(weight),
            None => self
                .repos
                .vitals
                .latest_before(date)?
                .and_then(|entry| entry.weight),
        };
        let context = WorkoutContext {
            weight,
            target_weight: profile.vital_goals.target_weight,
            calories_consumed: daily.calories.consumed,
            calorie_goal: daily.calories.goal,
            calories_burned: daily.calories_burned,
            steps_today: daily.steps,
        };
        Ok(advisor.suggest_workouts(&context)?)
    }

    /// One motivational sentence for `date`.
    ///
    /// # Contract
    /// - Never fails because of the advisor: a missing advisor, a failed
    ///   call or a blank answer yield [`FALLBACK_TIP`].
    pub fn daily_tip(
        &self,
        advisor: Option<&dyn GoalAdvisor>,
        date: NaiveDate,
    ) -> ServiceResult<String> {
        let Some(advisor) = advisor else {
            return Ok(FALLBACK_TIP.to_string());
        };
        let daily = self.daily(date)?;
        let context = TipContext {
            sleep_hours: daily.vitals.as_ref().and_then(|entry| entry.sleep_duration),
            steps_today: daily.steps,
            water_today: daily.water.consumed,
            calorie_balance: daily.calorie_balance,
        };
        match advisor.daily_tip(&context) {
            Ok(tip) if !tip.trim().is_empty() => Ok(tip.trim().to_string()),
            Ok(_) => Ok(FALLBACK_TIP.to_string()),
            Err(err) => {
                warn!(
                    "event=daily_tip module=service status=fallback error_kind={}",
                    err.kind()
                );
                Ok(FALLBACK_TIP.to_string())
            }
        }
    }
}

/// `consumed / goal` in percent, capped at 100; zero for a non-positive goal.
pub fn percent_of_goal(consumed: f64, goal: f64) -> f64 {
    if goal <= 0.0 || !goal.is_finite() {
        return 0.0;
    }
    round_to_tenth((consumed / goal * 100.0).clamp(0.0, 100.0))
}
