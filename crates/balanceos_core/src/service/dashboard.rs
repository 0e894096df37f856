//! Cached start-screen snapshot.
//!
//! # Responsibility
//! - Load every section the start screen shows in one call.
//! - Serve the cached snapshot while it is fresh.
//!
//! # Invariants
//! - Preload is a no-op while the last full load is younger than the TTL.
//! - A section that fails keeps its previous value; the other sections
//!   still update.
//! - Clearing resets every section and the freshness marker.

use crate::logging::elapsed_ms;
use crate::model::blocker::BlockRule;
use crate::model::finance::CategorySummary;
use crate::model::notification::Notification;
use crate::model::nutrition::NutritionEntry;
use crate::model::profile::Profile;
use crate::model::sport::SportDay;
use crate::model::vitals::VitalEntry;
use crate::repo::Repositories;
use crate::service::analytics_service::{AnalyticsService, Period, PeriodAnalytics};
use crate::service::{
    BlockerService, FinanceService, NotificationService, NutritionService, ProfileService,
    SportService, VitalsService,
};
use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::{Duration, Instant};

pub const DASHBOARD_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardSection {
    Profile,
    Nutrition,
    Vitals,
    Sport,
    Analytics,
    Finance,
    Blocker,
    Notifications,
}

impl DashboardSection {
    pub const ALL: [DashboardSection; 8] = [
        Self::Profile,
        Self::Nutrition,
        Self::Vitals,
        Self::Sport,
        Self::Analytics,
        Self::Finance,
        Self::Blocker,
        Self::Notifications,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Nutrition => "nutrition",
            Self::Vitals => "vitals",
            Self::Sport => "sport",
            Self::Analytics => "analytics",
            Self::Finance => "finance",
            Self::Blocker => "blocker",
            Self::Notifications => "notifications",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|section| section.as_str() == value.trim())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodSnapshots {
    pub today: Option<PeriodAnalytics>,
    pub month: Option<PeriodAnalytics>,
    pub all: Option<PeriodAnalytics>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionFailure {
    pub section: DashboardSection,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    /// Day the per-day sections were loaded for.
    pub date: Option<NaiveDate>,
    pub profile: Option<Profile>,
    pub today_nutrition: Vec<NutritionEntry>,
    pub today_vitals: Option<VitalEntry>,
    pub today_sport: Option<SportDay>,
    pub analytics: PeriodSnapshots,
    pub finance_summaries: Vec<CategorySummary>,
    pub blocker_rules: Vec<BlockRule>,
    pub notifications: Vec<Notification>,
    /// Failures of the most recent load, one per section.
    pub failures: Vec<SectionFailure>,
}

/// Outcome of [`DashboardCache::preload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadOutcome {
    /// Snapshot was fresh; nothing was loaded.
    Skipped,
    /// Every section was attempted; `failed` of them kept old values.
    Loaded { failed: usize },
}

pub struct DashboardCache {
    snapshot: DashboardSnapshot,
    loaded_at: Option<Instant>,
    ttl: Duration,
}

impl Default for DashboardCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardCache {
    pub fn new() -> Self {
        Self::with_ttl(DASHBOARD_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            snapshot: DashboardSnapshot::default(),
            loaded_at: None,
            ttl,
        }
    }

    pub fn snapshot(&self) -> &DashboardSnapshot {
        &self.snapshot
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        self.loaded_at
            .map_or(false, |loaded_at| now.saturating_duration_since(loaded_at) < self.ttl)
    }

    /// Loads every section unless the snapshot is still fresh.
    pub fn preload(
        &mut self,
        repos: &Repositories<'_>,
        today: NaiveDate,
        now: Instant,
    ) -> PreloadOutcome {
        if self.is_fresh(now) {
            return PreloadOutcome::Skipped;
        }
        let started_at = Instant::now();
        self.snapshot.failures.clear();
        for section in DashboardSection::ALL {
            self.load_section(repos, section, today);
        }
        self.snapshot.date = Some(today);
        self.loaded_at = Some(now);

        let failed = self.snapshot.failures.len();
        info!(
            "event=dashboard_preload module=service status={} failed_sections={} duration_ms={}",
            if failed == 0 { "ok" } else { "partial" },
            failed,
            elapsed_ms(started_at)
        );
        PreloadOutcome::Loaded { failed }
    }

    /// Reloads one section regardless of freshness.
    ///
    /// Returns `false` when the section failed and kept its previous value.
    pub fn refresh_section(
        &mut self,
        repos: &Repositories<'_>,
        section: DashboardSection,
        today: NaiveDate,
    ) -> bool {
        self.snapshot
            .failures
            .retain(|failure| failure.section != section);
        self.load_section(repos, section, today)
    }

    pub fn clear(&mut self) {
        self.snapshot = DashboardSnapshot::default();
        self.loaded_at = None;
    }

    fn load_section(
        &mut self,
        repos: &Repositories<'_>,
        section: DashboardSection,
        today: NaiveDate,
    ) -> bool {
        let snapshot = &mut self.snapshot;
        let result = match section {
            DashboardSection::Profile => {
                ProfileService::new(&*repos.profile, &*repos.vitals)
                    .get_profile()
                    .map(|profile| snapshot.profile = Some(profile))
                    .map_err(message)
            }
            DashboardSection::Nutrition => NutritionService::new(&*repos.nutrition)
                .list_entries(today)
                .map(|entries| snapshot.today_nutrition = entries)
                .map_err(message),
            DashboardSection::Vitals => VitalsService::new(&*repos.vitals, &*repos.profile)
                .get_vitals(today)
                .map(|entry| snapshot.today_vitals = Some(entry))
                .map_err(message),
            DashboardSection::Sport => SportService::new(&*repos.sport)
                .get_day(today)
                .map(|day| snapshot.today_sport = Some(day))
                .map_err(message),
            DashboardSection::Analytics => load_periods(repos, today, &mut snapshot.analytics),
            DashboardSection::Finance => FinanceService::new(&*repos.finance)
                .all_summaries()
                .map(|summaries| snapshot.finance_summaries = summaries)
                .map_err(message),
            DashboardSection::Blocker => BlockerService::new(repos)
                .list_rules()
                .map(|rules| snapshot.blocker_rules = rules)
                .map_err(message),
            DashboardSection::Notifications => NotificationService::new(&*repos.notifications)
                .list()
                .map(|notifications| snapshot.notifications = notifications)
                .map_err(message),
        };

        match result {
            Ok(()) => true,
            Err(message) => {
                warn!(
                    "event=dashboard_section module=service status=error section={}",
                    section.as_str()
                );
                snapshot.failures.push(SectionFailure { section, message });
                false
            }
        }
    }
}

/// Each period keeps its previous value on failure; the first failure is
/// reported for the whole section.
fn load_periods(
    repos: &Repositories<'_>,
    today: NaiveDate,
    periods: &mut PeriodSnapshots,
) -> Result<(), String> {
    let analytics = AnalyticsService::new(repos);
    let mut first_error = None;
    for (period, slot) in [
        (Period::Today, &mut periods.today),
        (Period::Month, &mut periods.month),
        (Period::All, &mut periods.all),
    ] {
        match analytics.period(period, today) {
            Ok(report) => *slot = Some(report),
            Err(err) => {
                first_error.get_or_insert_with(|| err.to_string());
            }
        }
    }
    match first_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn message(error: impl Display) -> String {
    error.to_string()
}
