//! Finance use-cases: budget categories, spending entries and summaries.

use crate::model::finance::{
    CategoryInput, CategorySummary, EntryFilter, FinanceCategory, FinanceEntry, FinanceEntryInput,
};
use crate::model::RecordId;
use crate::repo::FinanceRepository;
use crate::service::{ServiceError, ServiceResult};

pub struct FinanceService<R: FinanceRepository> {
    repo: R,
}

impl<R: FinanceRepository> FinanceService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn list_categories(&self) -> ServiceResult<Vec<FinanceCategory>> {
        Ok(self.repo.list_categories()?)
    }

    pub fn create_category(&self, input: CategoryInput) -> ServiceResult<FinanceCategory> {
        input.validate()?;
        let category = input.into_new_category();
        let id = self.repo.create_category(&category)?;
        self.repo
            .get_category(id)?
            .ok_or(ServiceError::InconsistentState(
                "created finance category not found in read-back",
            ))
    }

    /// Replaces name, budget, rhythm and color of category `id`.
    pub fn update_category(
        &self,
        id: RecordId,
        input: CategoryInput,
    ) -> ServiceResult<FinanceCategory> {
        input.validate()?;
        if self.repo.get_category(id)?.is_none() {
            return Err(ServiceError::not_found("finance category", id));
        }
        self.repo.update_category(&input.into_category(id))?;
        self.repo
            .get_category(id)?
            .ok_or(ServiceError::InconsistentState(
                "updated finance category not found in read-back",
            ))
    }

    /// Deletes the category together with its entries.
    pub fn delete_category(&self, id: RecordId) -> ServiceResult<()> {
        Ok(self.repo.delete_category(id)?)
    }

    pub fn list_entries(&self, filter: &EntryFilter) -> ServiceResult<Vec<FinanceEntry>> {
        Ok(self.repo.list_entries(filter)?)
    }

    /// # Contract
    /// - The referenced category must exist.
    pub fn create_entry(&self, input: FinanceEntryInput) -> ServiceResult<FinanceEntry> {
        input.validate()?;
        if self.repo.get_category(input.category_id)?.is_none() {
            return Err(ServiceError::not_found("finance category", input.category_id));
        }
        let entry = input.into_entry();
        self.repo.create_entry(&entry)?;
        Ok(entry)
    }

    /// Replaces entry `id`; the entry may move to another existing category.
    pub fn update_entry(
        &self,
        id: RecordId,
        input: FinanceEntryInput,
    ) -> ServiceResult<FinanceEntry> {
        input.validate()?;
        if self.repo.get_category(input.category_id)?.is_none() {
            return Err(ServiceError::not_found("finance category", input.category_id));
        }
        let entry = FinanceEntry {
            id,
            ..input.into_entry()
        };
        self.repo.update_entry(&entry)?;
        Ok(entry)
    }

    pub fn delete_entry(&self, id: RecordId) -> ServiceResult<()> {
        Ok(self.repo.delete_entry(id)?)
    }

    /// Spending of one category over all its entries.
    pub fn category_summary(&self, id: RecordId) -> ServiceResult<CategorySummary> {
        let category = self
            .repo
            .get_category(id)?
            .ok_or_else(|| ServiceError::not_found("finance category", id))?;
        let entries = self.repo.list_entries(&EntryFilter::category(id))?;
        Ok(CategorySummary::new(category, entries))
    }

    /// One summary per category, in category list order.
    pub fn all_summaries(&self) -> ServiceResult<Vec<CategorySummary>> {
        let categories = self.repo.list_categories()?;
        let mut entries = self.repo.list_entries(&EntryFilter::default())?;
        let mut summaries = Vec::with_capacity(categories.len());
        for category in categories {
            let (own, rest): (Vec<_>, Vec<_>) = entries
                .into_iter()
                .partition(|entry| entry.category_id == category.id);
            entries = rest;
            summaries.push(CategorySummary::new(category, own));
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::FinanceService;
    use crate::db::open_db_in_memory;
    use crate::model::finance::{CategoryInput, EntryFilter, FinanceEntryInput};
    use crate::repo::SqliteFinanceRepository;
    use crate::service::ServiceError;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn entry(category_id: Uuid, day: u32, amount: f64) -> FinanceEntryInput {
        FinanceEntryInput {
            category_id,
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            description: "Einkauf".to_string(),
            amount,
        }
    }

    #[test]
    fn summaries_group_entries_by_category() {
        let conn = open_db_in_memory().unwrap();
        let service = FinanceService::new(SqliteFinanceRepository::new(&conn));
        let food = service
            .create_category(CategoryInput::new("Lebensmittel", 300.0))
            .unwrap();
        let leisure = service
            .create_category(CategoryInput::new("Freizeit", 50.0))
            .unwrap();

        service.create_entry(entry(food.id, 3, 42.5)).unwrap();
        service.create_entry(entry(food.id, 9, 57.5)).unwrap();
        service.create_entry(entry(leisure.id, 4, 60.0)).unwrap();

        let food_summary = service.category_summary(food.id).unwrap();
        assert_eq!(food_summary.total_spent, 100.0);
        assert_eq!(food_summary.budget_remaining, 200.0);
        assert_eq!(food_summary.entries.len(), 2);

        let summaries = service.all_summaries().unwrap();
        assert_eq!(summaries.len(), 2);
        let leisure_summary = summaries
            .iter()
            .find(|summary| summary.category.id == leisure.id)
            .unwrap();
        assert_eq!(leisure_summary.budget_remaining, -10.0);
    }

    #[test]
    fn entry_for_unknown_category_is_not_found() {
        let conn = open_db_in_memory().unwrap();
        let service = FinanceService::new(SqliteFinanceRepository::new(&conn));
        let error = service.create_entry(entry(Uuid::new_v4(), 1, 5.0)).unwrap_err();
        assert!(matches!(error, ServiceError::NotFound { .. }));
    }

    #[test]
    fn update_replaces_fields_and_delete_cascades() {
        let conn = open_db_in_memory().unwrap();
        let service = FinanceService::new(SqliteFinanceRepository::new(&conn));
        let category = service
            .create_category(CategoryInput::new("Abos", 20.0))
            .unwrap();
        service.create_entry(entry(category.id, 1, 9.99)).unwrap();

        let mut input = CategoryInput::new("Streaming", 25.0);
        input.color = Some("#2196F3".to_string());
        let updated = service.update_category(category.id, input).unwrap();
        assert_eq!(updated.name, "Streaming");
        assert_eq!(updated.color, "#2196F3");

        service.delete_category(category.id).unwrap();
        assert!(service.list_categories().unwrap().is_empty());
        assert!(service
            .list_entries(&EntryFilter::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn entry_update_can_move_between_categories() {
        let conn = open_db_in_memory().unwrap();
        let service = FinanceService::new(SqliteFinanceRepository::new(&conn));
        let food = service
            .create_category(CategoryInput::new("Lebensmittel", 300.0))
            .unwrap();
        let leisure = service
            .create_category(CategoryInput::new("Freizeit", 50.0))
            .unwrap();
        let created = service.create_entry(entry(food.id, 2, 30.0)).unwrap();

        let updated = service
            .update_entry(created.id, entry(leisure.id, 6, 35.0))
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(service.category_summary(food.id).unwrap().total_spent, 0.0);
        assert_eq!(
            service.category_summary(leisure.id).unwrap().total_spent,
            35.0
        );

        let missing = service
            .update_entry(Uuid::new_v4(), entry(food.id, 2, 1.0))
            .unwrap_err();
        assert!(matches!(missing, ServiceError::NotFound { entity: "finance entry", .. }));
    }

    #[test]
    fn negative_amount_is_rejected() {
        let conn = open_db_in_memory().unwrap();
        let service = FinanceService::new(SqliteFinanceRepository::new(&conn));
        let category = service
            .create_category(CategoryInput::new("Auto", 100.0))
            .unwrap();
        let error = service.create_entry(entry(category.id, 2, -1.0)).unwrap_err();
        assert!(matches!(error, ServiceError::Validation(_)));
    }
}
