//! Nutrition use-cases: meal log CRUD, daily totals and AI estimates.
//!
//! # Invariants
//! - A create without time uses the caller's current wall-clock minute.
//! - An update without time keeps the stored time.

use crate::integration::{NutritionEstimate, NutritionEstimator};
use crate::model::calendar::truncate_to_minute;
use crate::model::nutrition::{NutritionEntry, NutritionInput, NutritionSummary};
use crate::model::{RecordId, ValidationError};
use crate::repo::NutritionRepository;
use crate::service::{ServiceError, ServiceResult};
use chrono::{NaiveDate, NaiveTime};

pub struct NutritionService<R: NutritionRepository> {
    repo: R,
}

impl<R: NutritionRepository> NutritionService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Entries of `date`, newest time first.
    pub fn list_entries(&self, date: NaiveDate) -> ServiceResult<Vec<NutritionEntry>> {
        Ok(self.repo.list_by_date(date)?)
    }

    pub fn create_entry(
        &self,
        input: NutritionInput,
        now: NaiveTime,
    ) -> ServiceResult<NutritionEntry> {
        let entry = input.into_entry(truncate_to_minute(now));
        let id = self.repo.create_entry(&entry)?;
        self.repo
            .get_entry(id)?
            .ok_or(ServiceError::InconsistentState(
                "created nutrition entry not found in read-back",
            ))
    }

    /// Replaces every field of entry `id` with `input`.
    pub fn update_entry(
        &self,
        id: RecordId,
        input: NutritionInput,
    ) -> ServiceResult<NutritionEntry> {
        let existing = self
            .repo
            .get_entry(id)?
            .ok_or_else(|| ServiceError::not_found("nutrition entry", id))?;
        let mut entry = input.into_entry(existing.time);
        entry.id = id;
        self.repo.update_entry(&entry)?;
        self.repo
            .get_entry(id)?
            .ok_or(ServiceError::InconsistentState(
                "updated nutrition entry not found in read-back",
            ))
    }

    pub fn delete_entry(&self, id: RecordId) -> ServiceResult<()> {
        Ok(self.repo.delete_entry(id)?)
    }

    pub fn daily_summary(&self, date: NaiveDate) -> ServiceResult<NutritionSummary> {
        let entries = self.repo.list_by_date(date)?;
        Ok(NutritionSummary::from_entries(date, &entries))
    }

    /// Estimates nutrients of a described meal without storing anything.
    pub fn estimate(
        &self,
        estimator: Option<&dyn NutritionEstimator>,
        description: &str,
        image_base64: Option<&str>,
    ) -> ServiceResult<NutritionEstimate> {
        let image = image_base64
            .map(str::trim)
            .filter(|image| !image.is_empty());
        let description = description.trim();
        if description.is_empty() && image.is_none() {
            return Err(ValidationError::EmptyField("description").into());
        }
        let estimator = estimator.ok_or(ServiceError::IntegrationDisabled("openai"))?;
        Ok(estimator.estimate_nutrition(description, image)?)
    }
}
