//! Process configuration read from environment variables.
//!
//! # Responsibility
//! - Collect storage, logging and integration settings in one place.
//! - Resolve secrets from `<NAME>_FILE` paths before plain variables.
//!
//! # Invariants
//! - Missing AI or wearable credentials disable that integration; they never
//!   fail start-up.
//! - A partially configured integration (id without secret) is an error.
//! - Secrets never appear in `Debug` output.

use crate::logging::{default_log_level, normalize_level};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_FITBIT_API_BASE_URL: &str = "https://api.fitbit.com";
pub const DEFAULT_FITBIT_AUTH_URL: &str = "https://www.fitbit.com/oauth2/authorize";

#[derive(Debug)]
pub enum ConfigError {
    /// A variable required by an enabled integration is missing.
    Missing(&'static str),
    /// A variable is present but unusable.
    Invalid { key: &'static str, reason: String },
    /// `<NAME>_FILE` points at a file that cannot be read.
    SecretFile {
        key: String,
        source: std::io::Error,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "missing required environment variable: {key}"),
            Self::Invalid { key, reason } => write!(f, "invalid value for {key}: {reason}"),
            Self::SecretFile { key, source } => write!(f, "failed to read {key}: {source}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SecretFile { source, .. } => Some(source),
            Self::Missing(_) | Self::Invalid { .. } => None,
        }
    }
}

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl Debug for OpenAiConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct FitbitConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub api_base_url: String,
    pub auth_url: String,
}

impl Debug for FitbitConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FitbitConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("api_base_url", &self.api_base_url)
            .field("auth_url", &self.auth_url)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// `None` leaves the choice to the caller: the CLI goes in-memory, the
    /// FFI uses a file in the temp dir.
    pub db_path: Option<PathBuf>,
    pub log_level: &'static str,
    /// `None` leaves file logging off.
    pub log_dir: Option<PathBuf>,
    pub openai: Option<OpenAiConfig>,
    pub fitbit: Option<FitbitConfig>,
}

impl CoreConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, so tests do not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let log_level = match value("BALANCEOS_LOG_LEVEL") {
            Some(raw) => normalize_level(&raw).map_err(|reason| ConfigError::Invalid {
                key: "BALANCEOS_LOG_LEVEL",
                reason,
            })?,
            None => default_log_level(),
        };

        let openai = match secret(&lookup, "OPENAI_API_KEY")? {
            Some(api_key) => Some(OpenAiConfig {
                api_key,
                model: value("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                base_url: value("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            }),
            None => None,
        };

        let fitbit = match value("FITBIT_CLIENT_ID") {
            Some(client_id) => Some(FitbitConfig {
                client_id,
                client_secret: secret(&lookup, "FITBIT_CLIENT_SECRET")?
                    .ok_or(ConfigError::Missing("FITBIT_CLIENT_SECRET"))?,
                redirect_uri: value("FITBIT_REDIRECT_URI")
                    .ok_or(ConfigError::Missing("FITBIT_REDIRECT_URI"))?,
                api_base_url: value("FITBIT_API_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_FITBIT_API_BASE_URL.to_string()),
                auth_url: DEFAULT_FITBIT_AUTH_URL.to_string(),
            }),
            None => None,
        };

        let config = Self {
            db_path: value("BALANCEOS_DB_PATH").map(PathBuf::from),
            log_level,
            log_dir: value("BALANCEOS_LOG_DIR").map(PathBuf::from),
            openai,
            fitbit,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid {
                    key: "BALANCEOS_LOG_DIR",
                    reason: format!("must be an absolute path, got `{}`", dir.display()),
                });
            }
        }
        if let Some(openai) = &self.openai {
            validate_url("OPENAI_BASE_URL", &openai.base_url)?;
            if openai.model.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    key: "OPENAI_MODEL",
                    reason: "must not be empty".to_string(),
                });
            }
        }
        if let Some(fitbit) = &self.fitbit {
            validate_url("FITBIT_API_BASE_URL", &fitbit.api_base_url)?;
            validate_url("FITBIT_REDIRECT_URI", &fitbit.redirect_uri)?;
        }
        Ok(())
    }
}

/// `<key>_FILE` wins over `<key>`; file content is trimmed.
fn secret<F>(lookup: &F, key: &'static str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let file_key = format!("{key}_FILE");
    if let Some(path) = lookup(&file_key).filter(|path| !path.trim().is_empty()) {
        let content = std::fs::read_to_string(path.trim()).map_err(|source| {
            ConfigError::SecretFile {
                key: file_key.clone(),
                source,
            }
        })?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Invalid {
                key,
                reason: format!("{file_key} points at an empty file"),
            });
        }
        return Ok(Some(trimmed.to_string()));
    }
    Ok(lookup(key)
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty()))
}

fn validate_url(key: &'static str, url: &str) -> Result<(), ConfigError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid {
            key,
            reason: "must not be empty".to_string(),
        });
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("expected an http(s) URL, got `{trimmed}`"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, DEFAULT_OPENAI_MODEL};
    use std::collections::HashMap;
    use std::io::Write;

    fn config_from(pairs: &[(&str, &str)]) -> Result<CoreConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        CoreConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_disables_integrations() {
        let config = config_from(&[]).unwrap();
        assert!(config.db_path.is_none());
        assert!(config.openai.is_none());
        assert!(config.fitbit.is_none());
    }

    #[test]
    fn openai_defaults_model_and_base_url() {
        let config = config_from(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        let openai = config.openai.unwrap();
        assert_eq!(openai.api_key, "sk-test");
        assert_eq!(openai.model, DEFAULT_OPENAI_MODEL);
        assert!(!format!("{openai:?}").contains("sk-test"));
    }

    #[test]
    fn secret_file_takes_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  from-file  ").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = config_from(&[
            ("OPENAI_API_KEY", "from-env"),
            ("OPENAI_API_KEY_FILE", &path),
        ])
        .unwrap();
        assert_eq!(config.openai.unwrap().api_key, "from-file");
    }

    #[test]
    fn unreadable_secret_file_is_reported() {
        let error = config_from(&[("OPENAI_API_KEY_FILE", "/nonexistent/balanceos/key")])
            .unwrap_err();
        assert!(matches!(error, ConfigError::SecretFile { .. }));
        assert!(error.to_string().contains("OPENAI_API_KEY_FILE"));
    }

    #[test]
    fn fitbit_client_id_without_secret_fails() {
        let error = config_from(&[("FITBIT_CLIENT_ID", "abc")]).unwrap_err();
        assert!(matches!(error, ConfigError::Missing("FITBIT_CLIENT_SECRET")));
    }

    #[test]
    fn fitbit_full_config_is_accepted() {
        let config = config_from(&[
            ("FITBIT_CLIENT_ID", "abc"),
            ("FITBIT_CLIENT_SECRET", "shh"),
            ("FITBIT_REDIRECT_URI", "https://app.example/callback"),
        ])
        .unwrap();
        let fitbit = config.fitbit.unwrap();
        assert_eq!(fitbit.api_base_url, "https://api.fitbit.com");
        assert!(!format!("{fitbit:?}").contains("shh"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config_from(&[("BALANCEOS_LOG_LEVEL", "loud")]).is_err());
        assert!(config_from(&[("BALANCEOS_LOG_DIR", "relative/logs")]).is_err());
        assert!(config_from(&[
            ("OPENAI_API_KEY", "k"),
            ("OPENAI_BASE_URL", "ftp://nope"),
        ])
        .is_err());
    }

    #[test]
    fn log_level_is_normalized() {
        let config = config_from(&[("BALANCEOS_LOG_LEVEL", " WARNING ")]).unwrap();
        assert_eq!(config.log_level, "warn");
    }
}
