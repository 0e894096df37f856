//! Core domain logic for BalanceOS.
//! This crate is the single source of truth for health, budget and
//! app-blocking invariants.

pub mod config;
pub mod db;
pub mod energy;
pub mod integration;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig, FitbitConfig, OpenAiConfig};
pub use integration::{FitbitClient, IntegrationError, OpenAiClient};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::{RecordId, ValidationError};
pub use repo::{RepoError, RepoResult, Repositories};
pub use service::analytics_service::Period;
pub use service::{
    AnalyticsService, BlockerService, DashboardCache, ExportService, FinanceService,
    FitbitService, NotificationService, NutritionService, ProfileService, ServiceError,
    ServiceResult, SportService, VitalsService,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
