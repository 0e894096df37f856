//! Use-case services over the repositories and integrations.
//!
//! # Responsibility
//! - Orchestrate repository calls into the operations the shell invokes.
//! - Derive computed fields (sleep duration, BMR, NEAT, analytics) at write
//!   or read time so repositories stay plain CRUD.
//!
//! # Invariants
//! - Services take the current date/time as arguments; none reads a clock.
//! - AI and wearable calls are optional; a missing client yields
//!   `IntegrationDisabled` instead of a panic or a silent default.

use crate::integration::IntegrationError;
use crate::model::ValidationError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod analytics_service;
pub mod blocker_service;
pub mod dashboard;
pub mod export_service;
pub mod finance_service;
pub mod fitbit_service;
pub mod notification_service;
pub mod nutrition_service;
pub mod profile_service;
pub mod sport_service;
pub mod vitals_service;

pub use analytics_service::AnalyticsService;
pub use blocker_service::{BlockerService, BlockerServiceError};
pub use dashboard::{DashboardCache, DashboardSection, DashboardSnapshot};
pub use export_service::ExportService;
pub use finance_service::FinanceService;
pub use fitbit_service::{FitbitService, FitbitServiceError};
pub use notification_service::NotificationService;
pub use nutrition_service::NutritionService;
pub use profile_service::ProfileService;
pub use sport_service::SportService;
pub use vitals_service::VitalsService;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error shared by the CRUD, analytics and export services.
#[derive(Debug)]
pub enum ServiceError {
    /// Input rejected before persistence.
    Validation(ValidationError),
    /// Target record does not exist.
    NotFound { entity: &'static str, id: String },
    /// Persistence-layer failure.
    Repo(RepoError),
    /// External API call failed.
    Integration(IntegrationError),
    /// The named integration has no credentials configured.
    IntegrationDisabled(&'static str),
    /// Write succeeded but read-back did not return the record.
    InconsistentState(&'static str),
    /// CSV rendering failed.
    Csv(csv::Error),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Integration(err) => write!(f, "{err}"),
            Self::IntegrationDisabled(name) => write!(f, "{name} integration is not configured"),
            Self::InconsistentState(details) => write!(f, "inconsistent state: {details}"),
            Self::Csv(err) => write!(f, "csv export failed: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Integration(err) => Some(err),
            Self::Csv(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<IntegrationError> for ServiceError {
    fn from(value: IntegrationError) -> Self {
        Self::Integration(value)
    }
}

impl From<csv::Error> for ServiceError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl ServiceError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
