//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions to Dart via FRB.
//! - Move records across the boundary as JSON so the shell shares one
//!   schema with the core's serde models.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every use-case call returns an [`ApiResponse`]; `data_json` is set
//!   only when `ok` is true.
//! - The wall clock is read here and nowhere in the core.

use balanceos_core::db::open_db;
use balanceos_core::integration::{GoalAdvisor, NutritionEstimator, WearableClient};
use balanceos_core::model::blocker::{BlockRuleInput, BlockRulePatch};
use balanceos_core::model::calendar::parse_date;
use balanceos_core::model::finance::{CategoryInput, EntryFilter, FinanceEntryInput};
use balanceos_core::model::notification::{NotificationInput, NotificationPatch};
use balanceos_core::model::nutrition::NutritionInput;
use balanceos_core::model::profile::ProfileUpdate;
use balanceos_core::model::sport::{SportInput, WorkoutInput};
use balanceos_core::model::vitals::VitalInput;
use balanceos_core::service::dashboard::{DashboardSection, PreloadOutcome};
use balanceos_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    AnalyticsService, BlockerService, CoreConfig, DashboardCache, ExportService, FinanceService,
    FitbitClient, FitbitService, NotificationService, NutritionService, OpenAiClient, Period,
    ProfileService, RecordId, Repositories, SportService, VitalsService,
};
use chrono::{Local, NaiveDate, NaiveDateTime};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Instant;
use uuid::Uuid;

const DB_FILE_NAME: &str = "balanceos.sqlite3";
static CONFIG: OnceLock<Result<CoreConfig, String>> = OnceLock::new();
static DASHBOARD: OnceLock<Mutex<DashboardCache>> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - UI-thread safe for current implementation.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Response envelope shared by every use-case call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// JSON payload of the result; `None` on failure.
    pub data_json: Option<String>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl ApiResponse {
    fn success(data_json: String) -> Self {
        Self {
            ok: true,
            data_json: Some(data_json),
            message: String::new(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data_json: None,
            message: message.into(),
        }
    }
}

// Profile

#[flutter_rust_bridge::frb(sync)]
pub fn profile_get() -> ApiResponse {
    run("profile_get", |repos| {
        ProfileService::new(&*repos.profile, &*repos.vitals)
            .get_profile()
            .map_err(text)
    })
}

/// `update_json`: partial profile; absent fields keep their value.
#[flutter_rust_bridge::frb(sync)]
pub fn profile_update(update_json: String) -> ApiResponse {
    run_write("profile_update", DashboardSection::Profile, |repos| {
        let update: ProfileUpdate = decode(&update_json)?;
        ProfileService::new(&*repos.profile, &*repos.vitals)
            .update_profile(update)
            .map_err(text)
    })
}

/// Suggested goals; nothing is saved.
///
/// # FFI contract
/// - Blocking network call when an OpenAI key is configured.
#[flutter_rust_bridge::frb(sync)]
pub fn profile_suggest_goals(goal_text: Option<String>) -> ApiResponse {
    run("profile_suggest_goals", |repos| {
        let client = openai_client()?;
        ProfileService::new(&*repos.profile, &*repos.vitals)
            .suggest_goals(
                client.as_ref().map(|client| client as &dyn GoalAdvisor),
                goal_text.as_deref(),
            )
            .map_err(text)
    })
}

// Nutrition

/// `date`: `YYYY-MM-DD`; empty means today.
#[flutter_rust_bridge::frb(sync)]
pub fn nutrition_list(date: String) -> ApiResponse {
    run("nutrition_list", |repos| {
        let date = day_or_today(&date)?;
        NutritionService::new(&*repos.nutrition)
            .list_entries(date)
            .map_err(text)
    })
}

/// Missing `time` defaults to the current minute.
#[flutter_rust_bridge::frb(sync)]
pub fn nutrition_create(input_json: String) -> ApiResponse {
    run_write("nutrition_create", DashboardSection::Nutrition, |repos| {
        let input: NutritionInput = decode(&input_json)?;
        NutritionService::new(&*repos.nutrition)
            .create_entry(input, local_now().time())
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn nutrition_update(id: String, input_json: String) -> ApiResponse {
    run_write("nutrition_update", DashboardSection::Nutrition, |repos| {
        let id = record_id(&id)?;
        let input: NutritionInput = decode(&input_json)?;
        NutritionService::new(&*repos.nutrition)
            .update_entry(id, input)
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn nutrition_delete(id: String) -> ApiResponse {
    run_write("nutrition_delete", DashboardSection::Nutrition, |repos| {
        let id = record_id(&id)?;
        NutritionService::new(&*repos.nutrition)
            .delete_entry(id)
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn nutrition_summary(date: String) -> ApiResponse {
    run("nutrition_summary", |repos| {
        let date = day_or_today(&date)?;
        NutritionService::new(&*repos.nutrition)
            .daily_summary(date)
            .map_err(text)
    })
}

/// Estimates nutrients of a meal description and/or photo.
///
/// # FFI contract
/// - Blocking network call; nothing is stored.
#[flutter_rust_bridge::frb(sync)]
pub fn nutrition_estimate(description: String, image_base64: Option<String>) -> ApiResponse {
    run("nutrition_estimate", |repos| {
        let client = openai_client()?;
        NutritionService::new(&*repos.nutrition)
            .estimate(
                client.as_ref().map(|client| client as &dyn NutritionEstimator),
                &description,
                image_base64.as_deref(),
            )
            .map_err(text)
    })
}

// Vitals

/// Stored entry, carried-over weight, or an empty entry.
#[flutter_rust_bridge::frb(sync)]
pub fn vitals_get(date: String) -> ApiResponse {
    run("vitals_get", |repos| {
        let date = day_or_today(&date)?;
        VitalsService::new(&*repos.vitals, &*repos.profile)
            .get_vitals(date)
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn vitals_upsert(input_json: String) -> ApiResponse {
    run_write("vitals_upsert", DashboardSection::Vitals, |repos| {
        let input: VitalInput = decode(&input_json)?;
        VitalsService::new(&*repos.vitals, &*repos.profile)
            .upsert_vitals(input)
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn vitals_history(days: u32) -> ApiResponse {
    run("vitals_history", |repos| {
        VitalsService::new(&*repos.vitals, &*repos.profile)
            .history(days)
            .map_err(text)
    })
}

// Sport

#[flutter_rust_bridge::frb(sync)]
pub fn sport_get(date: String) -> ApiResponse {
    run("sport_get", |repos| {
        let date = day_or_today(&date)?;
        SportService::new(&*repos.sport).get_day(date).map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn sport_upsert(input_json: String) -> ApiResponse {
    run_write("sport_upsert", DashboardSection::Sport, |repos| {
        let input: SportInput = decode(&input_json)?;
        SportService::new(&*repos.sport).upsert_day(input).map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn sport_add_workout(date: String, workout_json: String) -> ApiResponse {
    run_write("sport_add_workout", DashboardSection::Sport, |repos| {
        let date = day_or_today(&date)?;
        let workout: WorkoutInput = decode(&workout_json)?;
        SportService::new(&*repos.sport)
            .add_workout(date, workout)
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn sport_delete_workout(date: String, workout_id: String) -> ApiResponse {
    run_write("sport_delete_workout", DashboardSection::Sport, |repos| {
        let date = day_or_today(&date)?;
        let workout_id = record_id(&workout_id)?;
        SportService::new(&*repos.sport)
            .delete_workout(date, workout_id)
            .map_err(text)
    })
}

// Analytics

#[flutter_rust_bridge::frb(sync)]
pub fn analytics_daily(date: String) -> ApiResponse {
    run("analytics_daily", |repos| {
        let date = day_or_today(&date)?;
        AnalyticsService::new(repos).daily(date).map_err(text)
    })
}

/// Seven days ending at `end_date`, newest first.
#[flutter_rust_bridge::frb(sync)]
pub fn analytics_weekly(end_date: String) -> ApiResponse {
    run("analytics_weekly", |repos| {
        let end_date = day_or_today(&end_date)?;
        AnalyticsService::new(repos).weekly(end_date).map_err(text)
    })
}

/// `period`: `today|month|all`.
#[flutter_rust_bridge::frb(sync)]
pub fn analytics_period(period: String) -> ApiResponse {
    run("analytics_period", |repos| {
        let period =
            Period::parse(&period).ok_or_else(|| format!("unknown period `{}`", period.trim()))?;
        AnalyticsService::new(repos)
            .period(period, local_today())
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn analytics_workout_suggestions() -> ApiResponse {
    run("analytics_workout_suggestions", |repos| {
        let client = openai_client()?;
        AnalyticsService::new(repos)
            .workout_suggestions(
                client.as_ref().map(|client| client as &dyn GoalAdvisor),
                local_today(),
            )
            .map_err(text)
    })
}

/// Always succeeds with a tip unless the database is unavailable.
#[flutter_rust_bridge::frb(sync)]
pub fn analytics_daily_tip() -> ApiResponse {
    run("analytics_daily_tip", |repos| {
        let client = openai_client().ok().flatten();
        AnalyticsService::new(repos)
            .daily_tip(
                client.as_ref().map(|client| client as &dyn GoalAdvisor),
                local_today(),
            )
            .map_err(text)
    })
}

// Finance

#[flutter_rust_bridge::frb(sync)]
pub fn finance_categories() -> ApiResponse {
    run("finance_categories", |repos| {
        FinanceService::new(&*repos.finance)
            .list_categories()
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn finance_create_category(input_json: String) -> ApiResponse {
    run_write("finance_create_category", DashboardSection::Finance, |repos| {
        let input: CategoryInput = decode(&input_json)?;
        FinanceService::new(&*repos.finance)
            .create_category(input)
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn finance_update_category(id: String, input_json: String) -> ApiResponse {
    run_write("finance_update_category", DashboardSection::Finance, |repos| {
        let id = record_id(&id)?;
        let input: CategoryInput = decode(&input_json)?;
        FinanceService::new(&*repos.finance)
            .update_category(id, input)
            .map_err(text)
    })
}

/// Entries of the category go with it.
#[flutter_rust_bridge::frb(sync)]
pub fn finance_delete_category(id: String) -> ApiResponse {
    run_write("finance_delete_category", DashboardSection::Finance, |repos| {
        let id = record_id(&id)?;
        FinanceService::new(&*repos.finance)
            .delete_category(id)
            .map_err(text)
    })
}

/// `filter_json`: `{category_id?, start?, end?}`; empty string lists all.
#[flutter_rust_bridge::frb(sync)]
pub fn finance_entries(filter_json: String) -> ApiResponse {
    run("finance_entries", |repos| {
        let filter: EntryFilter = if filter_json.trim().is_empty() {
            EntryFilter::default()
        } else {
            decode(&filter_json)?
        };
        FinanceService::new(&*repos.finance)
            .list_entries(&filter)
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn finance_create_entry(input_json: String) -> ApiResponse {
    run_write("finance_create_entry", DashboardSection::Finance, |repos| {
        let input: FinanceEntryInput = decode(&input_json)?;
        FinanceService::new(&*repos.finance)
            .create_entry(input)
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn finance_update_entry(id: String, input_json: String) -> ApiResponse {
    run_write("finance_update_entry", DashboardSection::Finance, |repos| {
        let id = record_id(&id)?;
        let input: FinanceEntryInput = decode(&input_json)?;
        FinanceService::new(&*repos.finance)
            .update_entry(id, input)
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn finance_delete_entry(id: String) -> ApiResponse {
    run_write("finance_delete_entry", DashboardSection::Finance, |repos| {
        let id = record_id(&id)?;
        FinanceService::new(&*repos.finance)
            .delete_entry(id)
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn finance_summaries() -> ApiResponse {
    run("finance_summaries", |repos| {
        FinanceService::new(&*repos.finance)
            .all_summaries()
            .map_err(text)
    })
}

// App blocker

/// Rules without passwords.
#[flutter_rust_bridge::frb(sync)]
pub fn blocker_rules() -> ApiResponse {
    run("blocker_rules", |repos| {
        BlockerService::new(repos).list_rules().map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn blocker_create_rule(input_json: String) -> ApiResponse {
    run_write("blocker_create_rule", DashboardSection::Blocker, |repos| {
        let input: BlockRuleInput = decode(&input_json)?;
        BlockerService::new(repos)
            .create_rule(input, local_now())
            .map_err(text)
    })
}

/// Refused while the rule is edit-locked or currently blocking.
#[flutter_rust_bridge::frb(sync)]
pub fn blocker_update_rule(id: String, patch_json: String) -> ApiResponse {
    run_write("blocker_update_rule", DashboardSection::Blocker, |repos| {
        let id = record_id(&id)?;
        let patch: BlockRulePatch = decode(&patch_json)?;
        BlockerService::new(repos)
            .update_rule(id, patch, local_now())
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn blocker_delete_rule(id: String) -> ApiResponse {
    run_write("blocker_delete_rule", DashboardSection::Blocker, |repos| {
        let id = record_id(&id)?;
        BlockerService::new(repos)
            .delete_rule(id, local_now())
            .map_err(text)
    })
}

/// `data_json` is `true` or `false`.
#[flutter_rust_bridge::frb(sync)]
pub fn blocker_verify_password(id: String, password: String) -> ApiResponse {
    run("blocker_verify_password", |repos| {
        let id = record_id(&id)?;
        BlockerService::new(repos)
            .verify_password(id, &password)
            .map_err(text)
    })
}

/// Compares today's logged workout minutes with the rule's minimum.
#[flutter_rust_bridge::frb(sync)]
pub fn blocker_verify_sport(id: String) -> ApiResponse {
    run("blocker_verify_sport", |repos| {
        let id = record_id(&id)?;
        BlockerService::new(repos)
            .verify_sport(id, local_today())
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn blocker_temporary_unlock(id: String, app_name: Option<String>) -> ApiResponse {
    run("blocker_temporary_unlock", |repos| {
        let id = record_id(&id)?;
        BlockerService::new(repos)
            .temporary_unlock(id, app_name, local_now())
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn blocker_active_unlocks() -> ApiResponse {
    run("blocker_active_unlocks", |repos| {
        BlockerService::new(repos)
            .active_unlocks(local_now())
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn blocker_status() -> ApiResponse {
    run("blocker_status", |repos| {
        BlockerService::new(repos).status(local_now()).map_err(text)
    })
}

// Notifications

#[flutter_rust_bridge::frb(sync)]
pub fn notifications_list() -> ApiResponse {
    run("notifications_list", |repos| {
        NotificationService::new(&*repos.notifications)
            .list()
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn notifications_create(input_json: String) -> ApiResponse {
    run_write("notifications_create", DashboardSection::Notifications, |repos| {
        let input: NotificationInput = decode(&input_json)?;
        NotificationService::new(&*repos.notifications)
            .create(input)
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn notifications_update(id: String, patch_json: String) -> ApiResponse {
    run_write("notifications_update", DashboardSection::Notifications, |repos| {
        let id = record_id(&id)?;
        let patch: NotificationPatch = decode(&patch_json)?;
        NotificationService::new(&*repos.notifications)
            .update(id, patch)
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn notifications_delete(id: String) -> ApiResponse {
    run_write("notifications_delete", DashboardSection::Notifications, |repos| {
        let id = record_id(&id)?;
        NotificationService::new(&*repos.notifications)
            .delete(id)
            .map_err(text)
    })
}

/// `data_json` is the new `is_active` state.
#[flutter_rust_bridge::frb(sync)]
pub fn notifications_toggle(id: String) -> ApiResponse {
    run_write("notifications_toggle", DashboardSection::Notifications, |repos| {
        let id = record_id(&id)?;
        NotificationService::new(&*repos.notifications)
            .toggle(id)
            .map_err(text)
    })
}

/// Notifications the shell should deliver this minute.
#[flutter_rust_bridge::frb(sync)]
pub fn notifications_due() -> ApiResponse {
    run("notifications_due", |repos| {
        NotificationService::new(&*repos.notifications)
            .due_at(local_now())
            .map_err(text)
    })
}

// Fitbit

/// URL the shell opens for the OAuth consent screen.
#[flutter_rust_bridge::frb(sync)]
pub fn fitbit_authorization_url(state: Option<String>) -> ApiResponse {
    run("fitbit_authorization_url", |repos| {
        let client = fitbit_client()?;
        FitbitService::new(repos, client.as_ref().map(|client| client as &dyn WearableClient))
            .authorization_url(state.as_deref())
            .map_err(text)
    })
}

/// # FFI contract
/// - Blocking network call (token exchange).
#[flutter_rust_bridge::frb(sync)]
pub fn fitbit_connect(code: String) -> ApiResponse {
    run("fitbit_connect", |repos| {
        let client = fitbit_client()?;
        FitbitService::new(repos, client.as_ref().map(|client| client as &dyn WearableClient))
            .connect(&code, local_now())
            .map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn fitbit_status() -> ApiResponse {
    run("fitbit_status", |repos| {
        FitbitService::new(repos, None).status().map_err(text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn fitbit_disconnect() -> ApiResponse {
    run("fitbit_disconnect", |repos| {
        FitbitService::new(repos, None).disconnect().map_err(text)
    })
}

/// Pulls one day from Fitbit; `date` empty means today.
///
/// # FFI contract
/// - Blocking network calls, one per metric.
/// - Per-metric failures are in the returned report, not in `message`.
#[flutter_rust_bridge::frb(sync)]
pub fn fitbit_sync(date: String) -> ApiResponse {
    let response = run("fitbit_sync", |repos| {
        let date = day_or_today(&date)?;
        let client = fitbit_client()?;
        FitbitService::new(repos, client.as_ref().map(|client| client as &dyn WearableClient))
            .sync(date, local_now())
            .map_err(text)
    });
    if response.ok {
        refresh_dashboard(&[DashboardSection::Sport, DashboardSection::Vitals]);
    }
    response
}

// Export

/// CSV bundle for `start..=end`; empty bounds default to the last 30 days.
#[flutter_rust_bridge::frb(sync)]
pub fn export_csv(start: String, end: String) -> ApiResponse {
    run("export_csv", |repos| {
        let start = optional_day(&start)?;
        let end = optional_day(&end)?;
        ExportService::new(repos)
            .export(start, end, local_today())
            .map_err(text)
    })
}

// Dashboard

/// Loads the start-screen snapshot unless the cached one is still fresh.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - `message` is `cached` or `loaded` (with failed section count).
#[flutter_rust_bridge::frb(sync)]
pub fn dashboard_preload() -> ApiResponse {
    let mut cache = dashboard().lock().unwrap_or_else(PoisonError::into_inner);
    let result = with_repos(|repos| {
        Ok(cache.preload(repos, local_today(), Instant::now()))
    })
    .and_then(|outcome| encode(cache.snapshot()).map(|json| (outcome, json)));
    match result {
        Ok((outcome, json)) => {
            let mut response = ApiResponse::success(json);
            response.message = match outcome {
                PreloadOutcome::Skipped => "cached".to_string(),
                PreloadOutcome::Loaded { failed: 0 } => "loaded".to_string(),
                PreloadOutcome::Loaded { failed } => format!("loaded; {failed} section(s) failed"),
            };
            response
        }
        Err(err) => failure("dashboard_preload", err),
    }
}

/// Reloads one section (`profile|nutrition|vitals|sport|analytics|finance|blocker|notifications`).
#[flutter_rust_bridge::frb(sync)]
pub fn dashboard_refresh(section: String) -> ApiResponse {
    let Some(section) = DashboardSection::parse(&section) else {
        return failure(
            "dashboard_refresh",
            format!("unknown dashboard section `{}`", section.trim()),
        );
    };
    let mut cache = dashboard().lock().unwrap_or_else(PoisonError::into_inner);
    let result = with_repos(|repos| Ok(cache.refresh_section(repos, section, local_today())))
        .and_then(|_| encode(cache.snapshot()));
    match result {
        Ok(json) => ApiResponse::success(json),
        Err(err) => failure("dashboard_refresh", err),
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn dashboard_clear() -> ApiResponse {
    dashboard()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
    ApiResponse::success("null".to_string())
}

fn run<T: Serialize>(
    operation: &'static str,
    call: impl FnOnce(&Repositories<'_>) -> Result<T, String>,
) -> ApiResponse {
    match with_repos(call).and_then(|value| encode(&value)) {
        Ok(json) => ApiResponse::success(json),
        Err(err) => failure(operation, err),
    }
}

/// Like [`run`], then reloads `section` of an already loaded dashboard.
fn run_write<T: Serialize>(
    operation: &'static str,
    section: DashboardSection,
    call: impl FnOnce(&Repositories<'_>) -> Result<T, String>,
) -> ApiResponse {
    let response = run(operation, call);
    if response.ok {
        refresh_dashboard(&[section, DashboardSection::Analytics]);
    }
    response
}

fn refresh_dashboard(sections: &[DashboardSection]) {
    let mut cache = dashboard().lock().unwrap_or_else(PoisonError::into_inner);
    if cache.snapshot().date.is_none() {
        return;
    }
    let today = local_today();
    let refreshed = with_repos(|repos| {
        for section in sections {
            cache.refresh_section(repos, *section, today);
        }
        Ok(())
    });
    if let Err(err) = refreshed {
        warn!("event=dashboard_refresh module=ffi status=error error=\"{err}\"");
    }
}

fn with_repos<T>(call: impl FnOnce(&Repositories<'_>) -> Result<T, String>) -> Result<T, String> {
    let conn = open_db(resolve_db_path()?).map_err(|err| format!("DB open failed: {err}"))?;
    let repos = Repositories::sqlite(&conn).map_err(|err| format!("repo init failed: {err}"))?;
    call(&repos)
}

fn failure(operation: &'static str, message: String) -> ApiResponse {
    warn!("event=ffi_call module=ffi status=error op={operation}");
    ApiResponse::failure(format!("{operation} failed: {message}"))
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|err| format!("response encoding failed: {err}"))
}

fn decode<T: DeserializeOwned>(json: &str) -> Result<T, String> {
    serde_json::from_str(json).map_err(|err| format!("invalid input: {err}"))
}

fn text(err: impl Display) -> String {
    err.to_string()
}

fn record_id(raw: &str) -> Result<RecordId, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("invalid id `{}`", raw.trim()))
}

fn optional_day(raw: &str) -> Result<Option<NaiveDate>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    parse_date(raw)
        .map(Some)
        .ok_or_else(|| format!("invalid date `{raw}`, expected YYYY-MM-DD"))
}

fn day_or_today(raw: &str) -> Result<NaiveDate, String> {
    Ok(optional_day(raw)?.unwrap_or_else(local_today))
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn local_today() -> NaiveDate {
    local_now().date()
}

fn config() -> Result<&'static CoreConfig, String> {
    CONFIG
        .get_or_init(|| CoreConfig::from_env().map_err(text))
        .as_ref()
        .map_err(|err| format!("configuration error: {err}"))
}

fn openai_client() -> Result<Option<OpenAiClient>, String> {
    config()?
        .openai
        .as_ref()
        .map(OpenAiClient::new)
        .transpose()
        .map_err(text)
}

fn fitbit_client() -> Result<Option<FitbitClient>, String> {
    config()?
        .fitbit
        .as_ref()
        .map(FitbitClient::new)
        .transpose()
        .map_err(text)
}

fn dashboard() -> &'static Mutex<DashboardCache> {
    DASHBOARD.get_or_init(|| Mutex::new(DashboardCache::new()))
}

/// `BALANCEOS_DB_PATH` through [`CoreConfig`], else a file in the temp dir.
fn resolve_db_path() -> Result<PathBuf, String> {
    Ok(config()?
        .db_path
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join(DB_FILE_NAME)))
}

#[cfg(test)]
mod tests {
    use super::{
        blocker_create_rule, blocker_rules, core_version, dashboard_preload, dashboard_refresh,
        export_csv, finance_create_category, finance_create_entry, finance_entries,
        init_logging, nutrition_create, nutrition_delete, nutrition_list, ping, record_id,
        vitals_get,
    };
    use serde_json::{json, Value};
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn nutrition_create_then_list_and_delete() {
        let token = unique_token("meal");
        let created = nutrition_create(
            json!({
                "date": "2024-02-29",
                "time": "07:45",
                "description": token,
                "calories": 320.0,
                "protein": 14.0
            })
            .to_string(),
        );
        assert!(created.ok, "{}", created.message);
        let entry: Value = serde_json::from_str(created.data_json.as_deref().unwrap()).unwrap();
        let id = entry["id"].as_str().unwrap().to_string();
        assert_eq!(entry["time"], "07:45");

        let listed = nutrition_list("2024-02-29".to_string());
        assert!(listed.ok, "{}", listed.message);
        assert!(listed.data_json.unwrap().contains(&token));

        assert!(nutrition_delete(id).ok);
    }

    #[test]
    fn bad_input_is_reported_not_panicked() {
        let response = nutrition_create("{not json".to_string());
        assert!(!response.ok);
        assert!(response.data_json.is_none());
        assert!(response.message.starts_with("nutrition_create failed: invalid input"));

        let response = vitals_get("29.02.2024".to_string());
        assert!(!response.ok);
        assert!(response.message.contains("YYYY-MM-DD"));

        assert!(record_id("not-a-uuid").is_err());
    }

    #[test]
    fn blocker_rules_never_expose_passwords() {
        let name = unique_token("rule");
        let created = blocker_create_rule(
            json!({
                "name": name,
                "apps": ["com.video.app"],
                "schedule": { "days": [], "start_time": "03:00", "end_time": "03:01" },
                "unlock_method": "password",
                "password": "secret-pass"
            })
            .to_string(),
        );
        assert!(created.ok, "{}", created.message);
        assert!(!created.data_json.unwrap().contains("secret-pass"));

        let rules = blocker_rules();
        assert!(rules.ok, "{}", rules.message);
        let rules = rules.data_json.unwrap();
        assert!(rules.contains(&name));
        assert!(!rules.contains("secret-pass"));
    }

    #[test]
    fn finance_entries_filter_by_category() {
        let category = finance_create_category(
            json!({ "name": unique_token("budget"), "budget": 120.0 }).to_string(),
        );
        assert!(category.ok, "{}", category.message);
        let category: Value = serde_json::from_str(&category.data_json.unwrap()).unwrap();
        let category_id = category["id"].as_str().unwrap();

        let entry = finance_create_entry(
            json!({
                "category_id": category_id,
                "date": "2024-03-01",
                "description": "Kino",
                "amount": 12.5
            })
            .to_string(),
        );
        assert!(entry.ok, "{}", entry.message);

        let listed = finance_entries(json!({ "category_id": category_id }).to_string());
        let listed: Value = serde_json::from_str(&listed.data_json.unwrap()).unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[test]
    fn export_rejects_swapped_range() {
        let response = export_csv("2024-03-10".to_string(), "2024-03-01".to_string());
        assert!(!response.ok);

        let response = export_csv(String::new(), String::new());
        assert!(response.ok, "{}", response.message);
        let bundle: Value = serde_json::from_str(&response.data_json.unwrap()).unwrap();
        assert!(bundle["nutrition_csv"].as_str().unwrap().starts_with("Datum;"));
    }

    #[test]
    fn dashboard_preload_returns_snapshot() {
        let response = dashboard_preload();
        assert!(response.ok, "{}", response.message);
        let snapshot: Value = serde_json::from_str(&response.data_json.unwrap()).unwrap();
        assert!(snapshot["profile"].is_object());

        assert!(!dashboard_refresh("widgets".to_string()).ok);
        assert!(dashboard_refresh("finance".to_string()).ok);
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}
