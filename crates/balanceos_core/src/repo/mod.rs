//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define one data access contract per aggregate.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Write paths validate records before any SQL mutation.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::ValidationError;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod codec;

pub mod blocker_repo;
pub mod finance_repo;
pub mod notification_repo;
pub mod nutrition_repo;
pub mod profile_repo;
pub mod sport_repo;
pub mod token_repo;
pub mod vitals_repo;

pub use blocker_repo::{BlockerRepository, SqliteBlockerRepository};
pub use finance_repo::{FinanceRepository, SqliteFinanceRepository};
pub use notification_repo::{NotificationRepository, SqliteNotificationRepository};
pub use nutrition_repo::{NutritionRepository, SqliteNutritionRepository};
pub use profile_repo::{ProfileRepository, SqliteProfileRepository};
pub use sport_repo::{SportRepository, SqliteSportRepository};
pub use token_repo::{SqliteTokenRepository, StoredTokens, TokenRepository};
pub use vitals_repo::{SqliteVitalsRepository, VitalsRepository};

pub type RepoResult<T> = Result<T, RepoError>;

/// Error shared by every repository.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound { entity: &'static str, id: String },
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
    /// Connection schema is not at the version this binary expects.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl RepoError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repositories require schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::InvalidData(_) => None,
            Self::UninitializedConnection { .. } => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Every repository over one connection, as trait objects so services that
/// span aggregates can be tested against substitutes.
pub struct Repositories<'conn> {
    pub profile: Box<dyn ProfileRepository + 'conn>,
    pub nutrition: Box<dyn NutritionRepository + 'conn>,
    pub vitals: Box<dyn VitalsRepository + 'conn>,
    pub sport: Box<dyn SportRepository + 'conn>,
    pub finance: Box<dyn FinanceRepository + 'conn>,
    pub blocker: Box<dyn BlockerRepository + 'conn>,
    pub notifications: Box<dyn NotificationRepository + 'conn>,
    pub tokens: Box<dyn TokenRepository + 'conn>,
}

impl<'conn> Repositories<'conn> {
    /// Builds SQLite repositories over a migrated connection.
    pub fn sqlite(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self {
            profile: Box::new(SqliteProfileRepository::new(conn)),
            nutrition: Box::new(SqliteNutritionRepository::new(conn)),
            vitals: Box::new(SqliteVitalsRepository::new(conn)),
            sport: Box::new(SqliteSportRepository::new(conn)),
            finance: Box::new(SqliteFinanceRepository::new(conn)),
            blocker: Box::new(SqliteBlockerRepository::new(conn)),
            notifications: Box::new(SqliteNotificationRepository::new(conn)),
            tokens: Box::new(SqliteTokenRepository::new(conn)),
        })
    }
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
