//! Wearable account connection and per-day sync.
//!
//! # Responsibility
//! - Hand out the authorization URL and turn the returned code into stored
//!   tokens.
//! - Pull steps, sleep, weight/body fat and resting heart rate for one date
//!   into the sport day and the vitals entry.
//!
//! # Invariants
//! - A record with `manual_override` is never touched by a sync.
//! - A failing metric is reported in `SyncReport::errors`; the remaining
//!   metrics still sync.
//! - A 401 from the wearable drops the stored tokens and ends the sync.

use crate::integration::{IntegrationError, TokenGrant, WearableClient};
use crate::logging::elapsed_ms;
use crate::model::sport::SportDay;
use crate::model::vitals::{EntrySource, VitalEntry};
use crate::repo::{RepoError, Repositories, StoredTokens};
use crate::service::vitals_service::VitalsService;
use crate::service::ServiceError;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

#[derive(Debug)]
pub enum FitbitServiceError {
    /// No client credentials configured.
    NotConfigured,
    /// No tokens stored.
    NotConnected,
    /// The wearable rejected the stored tokens; they have been removed.
    Unauthorized,
    Integration(IntegrationError),
    /// Local read or write failed.
    Storage(ServiceError),
}

impl Display for FitbitServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "fitbit integration is not configured"),
            Self::NotConnected => write!(f, "fitbit account is not connected"),
            Self::Unauthorized => write!(f, "fitbit authorization expired; reconnect required"),
            Self::Integration(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FitbitServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Integration(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IntegrationError> for FitbitServiceError {
    fn from(value: IntegrationError) -> Self {
        match value {
            IntegrationError::Unauthorized => Self::Unauthorized,
            other => Self::Integration(other),
        }
    }
}

impl From<ServiceError> for FitbitServiceError {
    fn from(value: ServiceError) -> Self {
        Self::Storage(value)
    }
}

impl From<RepoError> for FitbitServiceError {
    fn from(value: RepoError) -> Self {
        Self::Storage(value.into())
    }
}

pub type FitbitResult<T> = Result<T, FitbitServiceError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitbitStatus {
    pub connected: bool,
    pub user_id: Option<String>,
    pub expires_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub date: Option<NaiveDate>,
    /// Metric names written: `steps`, `sleep`, `weight`, `heart_rate`.
    pub synced: Vec<String>,
    /// Metrics left alone because the record has `manual_override`.
    pub skipped: Vec<String>,
    /// `metric: message` per failed metric.
    pub errors: Vec<String>,
}

impl SyncReport {
    fn failed(&mut self, metric: &str, error: &IntegrationError) {
        warn!(
            "event=wearable_sync module=service status=error metric={} error_kind={}",
            metric,
            error.kind()
        );
        self.errors.push(format!("{metric}: {error}"));
    }
}

const VITAL_METRICS: [&str; 3] = ["sleep", "weight", "heart_rate"];

pub struct FitbitService<'a, 'conn> {
    repos: &'a Repositories<'conn>,
    client: Option<&'a dyn WearableClient>,
}

impl<'a, 'conn> FitbitService<'a, 'conn> {
    /// `client` is `None` when no Fitbit credentials are configured.
    pub fn new(repos: &'a Repositories<'conn>, client: Option<&'a dyn WearableClient>) -> Self {
        Self { repos, client }
    }

    pub fn authorization_url(&self, state: Option<&str>) -> FitbitResult<String> {
        Ok(self.client()?.authorization_url(state)?)
    }

    /// Exchanges an authorization code and replaces any stored tokens.
    pub fn connect(&self, code: &str, now: NaiveDateTime) -> FitbitResult<FitbitStatus> {
        let grant = self.client()?.exchange_code(code.trim())?;
        let tokens = stored_from_grant(grant, now);
        self.repos.tokens.store_tokens(&tokens)?;
        info!("event=wearable_connect module=service status=ok");
        self.status()
    }

    pub fn status(&self) -> FitbitResult<FitbitStatus> {
        Ok(match self.repos.tokens.load_tokens()? {
            Some(tokens) => FitbitStatus {
                connected: true,
                user_id: tokens.user_id,
                expires_at: Some(tokens.expires_at),
            },
            None => FitbitStatus {
                connected: false,
                user_id: None,
                expires_at: None,
            },
        })
    }

    pub fn disconnect(&self) -> FitbitResult<()> {
        self.repos.tokens.clear_tokens()?;
        info!("event=wearable_disconnect module=service status=ok");
        Ok(())
    }

    /// Pulls every metric of `date`.
    ///
    /// # Contract
    /// - Expired tokens are refreshed first.
    /// - `Unauthorized` clears the tokens and aborts; other metric failures
    ///   are collected in the report.
    pub fn sync(&self, date: NaiveDate, now: NaiveDateTime) -> FitbitResult<SyncReport> {
        let started_at = Instant::now();
        let client = self.client()?;
        let tokens = self.valid_tokens(client, now)?;
        let result = self.sync_with(client, &tokens.access_token, date);
        match &result {
            Ok(report) => info!(
                "event=wearable_sync module=service status=ok synced={} skipped={} errors={} duration_ms={}",
                report.synced.len(),
                report.skipped.len(),
                report.errors.len(),
                elapsed_ms(started_at)
            ),
            Err(FitbitServiceError::Unauthorized) => {
                self.repos.tokens.clear_tokens()?;
                warn!(
                    "event=wearable_sync module=service status=error error_kind=unauthorized duration_ms={}",
                    elapsed_ms(started_at)
                );
            }
            Err(_) => warn!(
                "event=wearable_sync module=service status=error duration_ms={}",
                elapsed_ms(started_at)
            ),
        }
        result
    }

    fn sync_with(
        &self,
        client: &dyn WearableClient,
        access_token: &str,
        date: NaiveDate,
    ) -> FitbitResult<SyncReport> {
        let mut report = SyncReport {
            date: Some(date),
            ..SyncReport::default()
        };
        self.sync_steps(client, access_token, date, &mut report)?;
        self.sync_vitals(client, access_token, date, &mut report)?;
        Ok(report)
    }

    fn sync_steps(
        &self,
        client: &dyn WearableClient,
        access_token: &str,
        date: NaiveDate,
        report: &mut SyncReport,
    ) -> FitbitResult<()> {
        let mut day = self
            .repos
            .sport
            .get_by_date(date)?
            .unwrap_or_else(|| SportDay::empty(date));
        if day.is_stored() && day.manual_override {
            report.skipped.push("steps".to_string());
            return Ok(());
        }
        match client.activity_summary(access_token, date) {
            Ok(summary) => {
                day.steps = summary.steps;
                day.source = EntrySource::Fitbit;
                self.repos.sport.upsert_day(&day)?;
                report.synced.push("steps".to_string());
            }
            Err(IntegrationError::Unauthorized) => return Err(FitbitServiceError::Unauthorized),
            Err(err) => report.failed("steps", &err),
        }
        Ok(())
    }

    fn sync_vitals(
        &self,
        client: &dyn WearableClient,
        access_token: &str,
        date: NaiveDate,
        report: &mut SyncReport,
    ) -> FitbitResult<()> {
        let existing = self.repos.vitals.get_by_date(date)?;
        if existing.as_ref().map_or(false, |entry| entry.manual_override) {
            report
                .skipped
                .extend(VITAL_METRICS.iter().map(|metric| metric.to_string()));
            return Ok(());
        }

        let mut entry = existing.unwrap_or_else(|| VitalEntry::empty(date));
        let mut sleep_hours = None;
        let synced_before = report.synced.len();

        match client.sleep_log(access_token, date) {
            Ok(Some(sleep)) => {
                entry.sleep_start = sleep.start.or(entry.sleep_start);
                entry.sleep_end = sleep.end.or(entry.sleep_end);
                sleep_hours = Some(sleep.duration_hours);
                report.synced.push("sleep".to_string());
            }
            Ok(None) => {}
            Err(IntegrationError::Unauthorized) => return Err(FitbitServiceError::Unauthorized),
            Err(err) => report.failed("sleep", &err),
        }

        match client.weight_log(access_token, date) {
            Ok(Some(weight)) => {
                entry.weight = Some(weight.weight);
                entry.body_fat = weight.body_fat.or(entry.body_fat);
                report.synced.push("weight".to_string());
            }
            Ok(None) => {}
            Err(IntegrationError::Unauthorized) => return Err(FitbitServiceError::Unauthorized),
            Err(err) => report.failed("weight", &err),
        }

        match client.resting_heart_rate(access_token, date) {
            Ok(Some(bpm)) => {
                entry.resting_heart_rate = Some(bpm);
                report.synced.push("heart_rate".to_string());
            }
            Ok(None) => {}
            Err(IntegrationError::Unauthorized) => return Err(FitbitServiceError::Unauthorized),
            Err(err) => report.failed("heart_rate", &err),
        }

        if report.synced.len() == synced_before {
            return Ok(());
        }
        entry.source = EntrySource::Fitbit;
        VitalsService::new(&*self.repos.vitals, &*self.repos.profile).derive_energy(&mut entry)?;
        // Tracker duration excludes awake phases; keep it over the clock span.
        if sleep_hours.is_some() {
            entry.sleep_duration = sleep_hours;
        }
        self.repos.vitals.upsert(&entry)?;
        Ok(())
    }

    fn valid_tokens(
        &self,
        client: &dyn WearableClient,
        now: NaiveDateTime,
    ) -> FitbitResult<StoredTokens> {
        let tokens = self
            .repos
            .tokens
            .load_tokens()?
            .ok_or(FitbitServiceError::NotConnected)?;
        if !tokens.is_expired_at(now) {
            return Ok(tokens);
        }
        match client.refresh_token(&tokens.refresh_token) {
            Ok(grant) => {
                let mut refreshed = stored_from_grant(grant, now);
                if refreshed.user_id.is_none() {
                    refreshed.user_id = tokens.user_id;
                }
                self.repos.tokens.store_tokens(&refreshed)?;
                info!("event=wearable_token_refresh module=service status=ok");
                Ok(refreshed)
            }
            Err(IntegrationError::Unauthorized) => {
                self.repos.tokens.clear_tokens()?;
                warn!("event=wearable_token_refresh module=service status=error error_kind=unauthorized");
                Err(FitbitServiceError::Unauthorized)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn client(&self) -> FitbitResult<&'a dyn WearableClient> {
        self.client.ok_or(FitbitServiceError::NotConfigured)
    }
}

fn stored_from_grant(grant: TokenGrant, now: NaiveDateTime) -> StoredTokens {
    StoredTokens {
        access_token: grant.access_token,
        refresh_token: grant.refresh_token,
        expires_at: now + Duration::seconds(grant.expires_in.max(0)),
        user_id: grant.user_id,
    }
}

#[cfg(test)]
mod tests {
    use super::{FitbitService, FitbitServiceError};
    use crate::db::open_db_in_memory;
    use crate::integration::{
        ActivitySummary, IntegrationError, IntegrationResult, SleepLog, TokenGrant,
        WearableClient, WeightLog,
    };
    use crate::model::sport::SportInput;
    use crate::model::vitals::{EntrySource, VitalInput};
    use crate::repo::Repositories;
    use crate::service::{SportService, VitalsService};
    use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
    use std::cell::Cell;

    #[derive(Default)]
    struct FakeWearable {
        weight_fails: bool,
        revoked: bool,
        refreshes: Cell<u32>,
    }

    impl WearableClient for FakeWearable {
        fn authorization_url(&self, _state: Option<&str>) -> IntegrationResult<String> {
            Ok("https://www.fitbit.com/oauth2/authorize?client_id=abc".to_string())
        }

        fn exchange_code(&self, _code: &str) -> IntegrationResult<TokenGrant> {
            Ok(TokenGrant {
                access_token: "access".to_string(),
                refresh_token: "refresh".to_string(),
                expires_in: 3600,
                user_id: Some("ABC123".to_string()),
            })
        }

        fn refresh_token(&self, _refresh_token: &str) -> IntegrationResult<TokenGrant> {
            self.refreshes.set(self.refreshes.get() + 1);
            Ok(TokenGrant {
                access_token: "access-2".to_string(),
                refresh_token: "refresh-2".to_string(),
                expires_in: 3600,
                user_id: None,
            })
        }

        fn activity_summary(
            &self,
            _access_token: &str,
            _date: NaiveDate,
        ) -> IntegrationResult<ActivitySummary> {
            if self.revoked {
                return Err(IntegrationError::Unauthorized);
            }
            Ok(ActivitySummary { steps: 11_234 })
        }

        fn sleep_log(
            &self,
            _access_token: &str,
            _date: NaiveDate,
        ) -> IntegrationResult<Option<SleepLog>> {
            Ok(Some(SleepLog {
                duration_hours: 7.2,
                start: NaiveTime::from_hms_opt(23, 0, 0),
                end: NaiveTime::from_hms_opt(6, 45, 0),
            }))
        }

        fn weight_log(
            &self,
            _access_token: &str,
            _date: NaiveDate,
        ) -> IntegrationResult<Option<WeightLog>> {
            if self.weight_fails {
                return Err(IntegrationError::Status {
                    service: "fitbit",
                    status: 500,
                });
            }
            Ok(Some(WeightLog {
                weight: 81.3,
                body_fat: Some(19.5),
            }))
        }

        fn resting_heart_rate(
            &self,
            _access_token: &str,
            _date: NaiveDate,
        ) -> IntegrationResult<Option<u32>> {
            Ok(Some(58))
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
    }

    fn now() -> NaiveDateTime {
        date().and_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn missing_client_or_tokens_are_reported() {
        let conn = open_db_in_memory().unwrap();
        let repos = Repositories::sqlite(&conn).unwrap();

        let service = FitbitService::new(&repos, None);
        assert!(matches!(
            service.authorization_url(None).unwrap_err(),
            FitbitServiceError::NotConfigured
        ));
        assert!(!service.status().unwrap().connected);

        let wearable = FakeWearable::default();
        let service = FitbitService::new(&repos, Some(&wearable));
        assert!(matches!(
            service.sync(date(), now()).unwrap_err(),
            FitbitServiceError::NotConnected
        ));
    }

    #[test]
    fn sync_writes_steps_and_vitals() {
        let conn = open_db_in_memory().unwrap();
        let repos = Repositories::sqlite(&conn).unwrap();
        let wearable = FakeWearable::default();
        let service = FitbitService::new(&repos, Some(&wearable));

        let status = service.connect("code", now()).unwrap();
        assert!(status.connected);
        assert_eq!(status.user_id.as_deref(), Some("ABC123"));
        assert_eq!(status.expires_at, Some(now() + Duration::hours(1)));

        let report = service.sync(date(), now()).unwrap();
        assert_eq!(report.synced, vec!["steps", "sleep", "weight", "heart_rate"]);
        assert!(report.errors.is_empty());

        let day = repos.sport.get_by_date(date()).unwrap().unwrap();
        assert_eq!(day.steps, 11_234);
        assert_eq!(day.source, EntrySource::Fitbit);
        assert!(!day.manual_override);

        let vitals = repos.vitals.get_by_date(date()).unwrap().unwrap();
        assert_eq!(vitals.weight, Some(81.3));
        assert_eq!(vitals.body_fat, Some(19.5));
        assert_eq!(vitals.sleep_duration, Some(7.2));
        assert_eq!(vitals.resting_heart_rate, Some(58));
        assert_eq!(vitals.source, EntrySource::Fitbit);
        assert!(vitals.basal_metabolic_rate.is_some());
    }

    #[test]
    fn manual_records_are_skipped() {
        let conn = open_db_in_memory().unwrap();
        let repos = Repositories::sqlite(&conn).unwrap();
        let mut steps = SportInput::new(date());
        steps.steps = Some(500);
        SportService::new(&*repos.sport).upsert_day(steps).unwrap();
        let mut weight = VitalInput::new(date());
        weight.weight = Some(70.0);
        VitalsService::new(&*repos.vitals, &*repos.profile)
            .upsert_vitals(weight)
            .unwrap();

        let wearable = FakeWearable::default();
        let service = FitbitService::new(&repos, Some(&wearable));
        service.connect("code", now()).unwrap();
        let report = service.sync(date(), now()).unwrap();

        assert!(report.synced.is_empty());
        assert_eq!(report.skipped.len(), 4);
        assert_eq!(repos.sport.get_by_date(date()).unwrap().unwrap().steps, 500);
        assert_eq!(
            repos.vitals.get_by_date(date()).unwrap().unwrap().weight,
            Some(70.0)
        );
    }

    #[test]
    fn failed_metric_does_not_abort_sync() {
        let conn = open_db_in_memory().unwrap();
        let repos = Repositories::sqlite(&conn).unwrap();
        let wearable = FakeWearable {
            weight_fails: true,
            ..FakeWearable::default()
        };
        let service = FitbitService::new(&repos, Some(&wearable));
        service.connect("code", now()).unwrap();

        let report = service.sync(date(), now()).unwrap();
        assert_eq!(report.synced, vec!["steps", "sleep", "heart_rate"]);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("weight:"));
    }

    #[test]
    fn expired_tokens_are_refreshed_and_revoked_tokens_dropped() {
        let conn = open_db_in_memory().unwrap();
        let repos = Repositories::sqlite(&conn).unwrap();
        let wearable = FakeWearable::default();
        let service = FitbitService::new(&repos, Some(&wearable));
        service.connect("code", now()).unwrap();

        let later = now() + Duration::hours(2);
        service.sync(date(), later).unwrap();
        assert_eq!(wearable.refreshes.get(), 1);
        let tokens = repos.tokens.load_tokens().unwrap().unwrap();
        assert_eq!(tokens.access_token, "access-2");
        assert_eq!(tokens.user_id.as_deref(), Some("ABC123"));

        let revoked = FakeWearable {
            revoked: true,
            ..FakeWearable::default()
        };
        let service = FitbitService::new(&repos, Some(&revoked));
        assert!(matches!(
            service.sync(date(), later).unwrap_err(),
            FitbitServiceError::Unauthorized
        ));
        assert!(!service.status().unwrap().connected);
    }
}
