//! Outbound HTTP integrations.
//!
//! # Responsibility
//! - Wrap the AI chat-completion API and the wearable REST API behind traits
//!   so services can be exercised with substitutes.
//! - Translate transport and status failures into `IntegrationError`.
//!
//! # Invariants
//! - Clients are blocking and bounded by a request timeout.
//! - HTTP 401 always maps to `IntegrationError::Unauthorized`.
//! - Request and response bodies are never logged.

use reqwest::blocking::Response;
use reqwest::StatusCode;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub mod fitbit;
pub mod openai;

pub use fitbit::{
    ActivitySummary, FitbitClient, SleepLog, TokenGrant, WearableClient, WeightLog,
};
pub use openai::{
    Confidence, GoalAdvisor, GoalContext, GoalSuggestions, NutritionEstimate, NutritionEstimator,
    OpenAiClient, TipContext, WorkoutContext, WorkoutSuggestion, FALLBACK_TIP,
};

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub type IntegrationResult<T> = Result<T, IntegrationError>;

#[derive(Debug)]
pub enum IntegrationError {
    /// Request could not be sent or the body could not be read.
    Transport(reqwest::Error),
    /// Remote side answered with a non-success status other than 401.
    Status { service: &'static str, status: u16 },
    /// Remote side rejected the credentials.
    Unauthorized,
    /// Remote answer did not have the expected shape.
    InvalidResponse(String),
    /// Client settings cannot form a request (e.g. malformed base URL).
    InvalidConfig(String),
}

impl IntegrationError {
    /// Stable label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::Unauthorized => "unauthorized",
            Self::InvalidResponse(_) => "invalid_response",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}

impl Display for IntegrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "request failed: {err}"),
            Self::Status { service, status } => {
                write!(f, "{service} answered with HTTP {status}")
            }
            Self::Unauthorized => write!(f, "credentials were rejected"),
            Self::InvalidResponse(details) => write!(f, "unexpected response: {details}"),
            Self::InvalidConfig(details) => write!(f, "invalid client configuration: {details}"),
        }
    }
}

impl Error for IntegrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            Self::Status { .. }
            | Self::Unauthorized
            | Self::InvalidResponse(_)
            | Self::InvalidConfig(_) => None,
        }
    }
}

impl From<reqwest::Error> for IntegrationError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value)
    }
}

pub(crate) fn http_client() -> IntegrationResult<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(IntegrationError::Transport)
}

pub(crate) fn check_status(service: &'static str, response: Response) -> IntegrationResult<Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(IntegrationError::Unauthorized);
    }
    if !status.is_success() {
        return Err(IntegrationError::Status {
            service,
            status: status.as_u16(),
        });
    }
    Ok(response)
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::join_url;

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("http://a/v1/", "/chat"), "http://a/v1/chat");
        assert_eq!(join_url("http://a", "x.json"), "http://a/x.json");
    }
}
