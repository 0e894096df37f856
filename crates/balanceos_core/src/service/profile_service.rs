//! Profile use-cases: read, partial update and AI goal suggestions.

use crate::integration::{GoalAdvisor, GoalContext, GoalSuggestions};
use crate::model::profile::{Profile, ProfileUpdate};
use crate::model::ValidationError;
use crate::repo::{ProfileRepository, VitalsRepository};
use crate::service::{ServiceError, ServiceResult};

pub struct ProfileService<P: ProfileRepository, V: VitalsRepository> {
    profiles: P,
    vitals: V,
}

impl<P: ProfileRepository, V: VitalsRepository> ProfileService<P, V> {
    pub fn new(profiles: P, vitals: V) -> Self {
        Self { profiles, vitals }
    }

    /// Returns the profile, creating the default one on first access.
    pub fn get_profile(&self) -> ServiceResult<Profile> {
        Ok(self.profiles.load_profile()?)
    }

    /// Merges present fields of `update` into the stored profile.
    pub fn update_profile(&self, update: ProfileUpdate) -> ServiceResult<Profile> {
        let mut profile = self.profiles.load_profile()?;
        update.apply_to(&mut profile);
        Ok(self.profiles.save_profile(&profile)?)
    }

    /// Asks the advisor for goals based on the profile and the latest body
    /// metrics.
    ///
    /// # Contract
    /// - `goal_text` falls back to the stored overall goal; when both are
    ///   blank the request is rejected before any network call.
    /// - Suggestions are returned, not saved.
    pub fn suggest_goals(
        &self,
        advisor: Option<&dyn GoalAdvisor>,
        goal_text: Option<&str>,
    ) -> ServiceResult<GoalSuggestions> {
        let profile = self.profiles.load_profile()?;
        let goal = goal_text
            .or(profile.overall_goal.as_deref())
            .map(str::trim)
            .filter(|goal| !goal.is_empty())
            .ok_or(ServiceError::Validation(ValidationError::EmptyField("goal")))?
            .to_string();
        let advisor = advisor.ok_or(ServiceError::IntegrationDisabled("openai"))?;

        let latest = self.vitals.latest()?;
        let context = GoalContext {
            birth_date: profile.birth_date,
            height: profile.height,
            gender: profile.gender,
            weight: latest.as_ref().and_then(|entry| entry.weight),
            body_fat: latest.as_ref().and_then(|entry| entry.body_fat),
            goal,
        };
        Ok(advisor.suggest_goals(&context)?)
    }
}

#[cfg(test)]
mod tests {
    use super::ProfileService;
    use crate::db::open_db_in_memory;
    use crate::integration::{
        GoalAdvisor, GoalContext, GoalSuggestions, IntegrationResult, TipContext, WorkoutContext,
        WorkoutSuggestion,
    };
    use crate::model::profile::{Gender, ProfileUpdate};
    use crate::model::vitals::{VitalEntry, VitalInput};
    use crate::repo::{SqliteProfileRepository, SqliteVitalsRepository, VitalsRepository};
    use crate::service::ServiceError;
    use chrono::NaiveDate;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingAdvisor {
        seen: RefCell<Option<GoalContext>>,
    }

    impl GoalAdvisor for RecordingAdvisor {
        fn suggest_goals(&self, context: &GoalContext) -> IntegrationResult<GoalSuggestions> {
            self.seen.replace(Some(context.clone()));
            Ok(GoalSuggestions {
                explanation: "ok".to_string(),
                ..GoalSuggestions::default()
            })
        }

        fn suggest_workouts(
            &self,
            _context: &WorkoutContext,
        ) -> IntegrationResult<Vec<WorkoutSuggestion>> {
            Ok(Vec::new())
        }

        fn daily_tip(&self, _context: &TipContext) -> IntegrationResult<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn update_merges_only_present_fields() {
        let conn = open_db_in_memory().unwrap();
        let service = ProfileService::new(
            SqliteProfileRepository::new(&conn),
            SqliteVitalsRepository::new(&conn),
        );

        service
            .update_profile(ProfileUpdate {
                height: Some(180.0),
                gender: Some(Gender::Male),
                ..ProfileUpdate::default()
            })
            .unwrap();
        let profile = service
            .update_profile(ProfileUpdate {
                overall_goal: Some("fitter werden".to_string()),
                ..ProfileUpdate::default()
            })
            .unwrap();

        assert_eq!(profile.height, Some(180.0));
        assert_eq!(profile.gender, Some(Gender::Male));
        assert_eq!(profile.overall_goal.as_deref(), Some("fitter werden"));
    }

    #[test]
    fn blank_goal_is_rejected_before_advisor_is_needed() {
        let conn = open_db_in_memory().unwrap();
        let service = ProfileService::new(
            SqliteProfileRepository::new(&conn),
            SqliteVitalsRepository::new(&conn),
        );

        let error = service.suggest_goals(None, Some("   ")).unwrap_err();
        assert!(matches!(error, ServiceError::Validation(_)));

        let error = service.suggest_goals(None, Some("abnehmen")).unwrap_err();
        assert!(matches!(error, ServiceError::IntegrationDisabled("openai")));
    }

    #[test]
    fn goal_context_uses_latest_vitals() {
        let conn = open_db_in_memory().unwrap();
        let vitals = SqliteVitalsRepository::new(&conn);
        let mut input = VitalInput::new(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        input.weight = Some(77.5);
        input.body_fat = Some(18.0);
        let mut entry = VitalEntry::empty(input.date);
        input.merge_into(&mut entry);
        vitals.upsert(&entry).unwrap();

        let service = ProfileService::new(SqliteProfileRepository::new(&conn), &vitals);
        let advisor = RecordingAdvisor::default();
        let suggestions = service
            .suggest_goals(Some(&advisor), Some(" Muskeln aufbauen "))
            .unwrap();

        assert_eq!(suggestions.explanation, "ok");
        let seen = advisor.seen.borrow().clone().unwrap();
        assert_eq!(seen.goal, "Muskeln aufbauen");
        assert_eq!(seen.weight, Some(77.5));
        assert_eq!(seen.body_fat, Some(18.0));
    }
}
