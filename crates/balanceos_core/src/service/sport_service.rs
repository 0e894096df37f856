//! Sport use-cases: per-day activity, workouts and custom metrics.

use crate::model::sport::{SportDay, SportInput, WorkoutInput};
use crate::model::vitals::EntrySource;
use crate::model::RecordId;
use crate::repo::SportRepository;
use crate::service::ServiceResult;
use chrono::NaiveDate;
use serde_json::{Map, Value};

pub struct SportService<R: SportRepository> {
    repo: R,
}

impl<R: SportRepository> SportService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Stored day, or an unsaved empty day (0 steps, no workouts).
    pub fn get_day(&self, date: NaiveDate) -> ServiceResult<SportDay> {
        Ok(self
            .repo
            .get_by_date(date)?
            .unwrap_or_else(|| SportDay::empty(date)))
    }

    /// Merges `input` into the day of its date.
    ///
    /// # Contract
    /// - A stored `manual_override` day ignores input without the flag.
    /// - A present workouts list replaces the stored workouts.
    pub fn upsert_day(&self, input: SportInput) -> ServiceResult<SportDay> {
        input.validate()?;
        let mut day = self.get_day(input.date)?;
        if day.is_stored() && day.manual_override && !input.manual_override {
            return Ok(day);
        }
        let manual_override = input.manual_override;
        input.merge_into(&mut day);
        day.manual_override = manual_override;
        day.source = EntrySource::Manual;
        Ok(self.repo.upsert_day(&day)?)
    }

    /// Appends a workout, creating the day when missing.
    pub fn add_workout(&self, date: NaiveDate, input: WorkoutInput) -> ServiceResult<SportDay> {
        input.validate()?;
        Ok(self.repo.add_workout(date, &input.into_workout())?)
    }

    /// Removes one workout; the day itself must exist.
    pub fn delete_workout(&self, date: NaiveDate, workout_id: RecordId) -> ServiceResult<SportDay> {
        Ok(self.repo.delete_workout(date, workout_id)?)
    }

    /// Adds or replaces individual custom metrics, keeping the others.
    pub fn merge_custom_metrics(
        &self,
        date: NaiveDate,
        metrics: Map<String, Value>,
    ) -> ServiceResult<SportDay> {
        let mut day = self.get_day(date)?;
        day.custom_metrics.extend(metrics);
        Ok(self.repo.upsert_day(&day)?)
    }

    pub fn range(&self, start: NaiveDate, end: NaiveDate) -> ServiceResult<Vec<SportDay>> {
        Ok(self.repo.list_range(start, end)?)
    }
}

#[cfg(test)]
mod tests {
    use super::SportService;
    use crate::db::open_db_in_memory;
    use crate::model::sport::{SportInput, WorkoutInput};
    use crate::repo::SqliteSportRepository;
    use crate::service::ServiceError;
    use chrono::NaiveDate;
    use serde_json::{json, Map, Value};
    use uuid::Uuid;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn metrics(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn missing_day_is_empty_and_unsaved() {
        let conn = open_db_in_memory().unwrap();
        let service = SportService::new(SqliteSportRepository::new(&conn));
        let day = service.get_day(date()).unwrap();
        assert_eq!(day.steps, 0);
        assert!(day.workouts.is_empty());
        assert!(day.custom_metrics.is_empty());
        assert!(!day.is_stored());
    }

    #[test]
    fn add_workout_creates_day_and_delete_requires_it() {
        let conn = open_db_in_memory().unwrap();
        let service = SportService::new(SqliteSportRepository::new(&conn));

        let error = service.delete_workout(date(), Uuid::new_v4()).unwrap_err();
        assert!(matches!(error, ServiceError::NotFound { .. }));

        let day = service
            .add_workout(date(), WorkoutInput::new("running", 35))
            .unwrap();
        assert!(day.is_stored());
        assert_eq!(day.workout_minutes(), 35);

        let workout_id = day.workouts[0].id;
        let day = service.delete_workout(date(), workout_id).unwrap();
        assert!(day.workouts.is_empty());
    }

    #[test]
    fn upsert_keeps_absent_fields() {
        let conn = open_db_in_memory().unwrap();
        let service = SportService::new(SqliteSportRepository::new(&conn));
        service
            .add_workout(date(), WorkoutInput::new("yoga", 20))
            .unwrap();

        let mut input = SportInput::new(date());
        input.steps = Some(9000);
        let day = service.upsert_day(input).unwrap();
        assert_eq!(day.steps, 9000);
        assert_eq!(day.workouts.len(), 1);
    }

    #[test]
    fn custom_metrics_merge_per_key() {
        let conn = open_db_in_memory().unwrap();
        let service = SportService::new(SqliteSportRepository::new(&conn));

        service
            .merge_custom_metrics(date(), metrics(json!({"pushups": 20, "plank_s": 60})))
            .unwrap();
        let day = service
            .merge_custom_metrics(date(), metrics(json!({"pushups": 30})))
            .unwrap();

        assert_eq!(day.custom_metrics["pushups"], json!(30));
        assert_eq!(day.custom_metrics["plank_s"], json!(60));
    }
}
