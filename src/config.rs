//! Application-level configuration loading: admin credentials and room code settings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SQUID_TRIVIA_CONFIG_PATH";
/// Extra admin account read from the environment, on top of the file.
const ADMIN_EMAIL_ENV: &str = "SQUID_ADMIN_EMAIL";
const ADMIN_PASSWORD_ENV: &str = "SQUID_ADMIN_PASSWORD";
/// Length of generated room codes when the file does not say otherwise.
pub const DEFAULT_CODE_LENGTH: usize = 6;
const MIN_CODE_LENGTH: usize = 4;
/// Sessions without requests or open streams for this long are closed.
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;
/// Longest room code the setup operation can produce.
pub const MAX_CODE_LENGTH: usize = 12;

/// Email/password pair allowed to open an admin session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    admins: Vec<AdminCredentials>,
    code_length: usize,
    session_idle: Duration,
}

impl AppConfig {
    /// Load the configuration from disk and the environment, falling back to
    /// built-in defaults when the file is missing or malformed.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        admins = app_config.admins.len(),
                        code_length = app_config.code_length,
                        session_idle_secs = app_config.session_idle.as_secs(),
                        "loaded config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if let Some(admin) = admin_from_env() {
            info!(email = %admin.email, "admin account added from environment");
            config.admins.push(admin);
        }
        if config.admins.is_empty() {
            warn!("no admin account configured; admin login will always fail");
        }
        config
    }

    /// Build a configuration directly, mostly for tests.
    pub fn new(admins: Vec<AdminCredentials>, code_length: usize) -> Self {
        Self {
            admins,
            code_length: clamp_code_length(code_length),
            session_idle: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
        }
    }

    /// Replace the idle timeout after which sessions are closed.
    pub fn with_session_idle(mut self, idle: Duration) -> Self {
        self.session_idle = idle;
        self
    }

    pub fn admins(&self) -> &[AdminCredentials] {
        &self.admins
    }

    /// Number of characters in generated room codes.
    pub fn code_length(&self) -> usize {
        self.code_length
    }

    pub fn session_idle(&self) -> Duration {
        self.session_idle
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new(Vec::new(), DEFAULT_CODE_LENGTH)
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    admins: Vec<AdminCredentials>,
    #[serde(default)]
    code_length: Option<usize>,
    #[serde(default)]
    session_idle_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let idle = value.session_idle_secs.unwrap_or(DEFAULT_SESSION_IDLE_SECS);
        Self::new(
            value.admins,
            value.code_length.unwrap_or(DEFAULT_CODE_LENGTH),
        )
        .with_session_idle(Duration::from_secs(idle.max(1)))
    }
}

fn clamp_code_length(length: usize) -> usize {
    let clamped = length.clamp(MIN_CODE_LENGTH, MAX_CODE_LENGTH);
    if clamped != length {
        warn!(requested = length, used = clamped, "room code length out of range");
    }
    clamped
}

fn admin_from_env() -> Option<AdminCredentials> {
    let email = env::var(ADMIN_EMAIL_ENV).ok().filter(|v| !v.trim().is_empty())?;
    let password = env::var(ADMIN_PASSWORD_ENV).ok().filter(|v| !v.is_empty())?;
    Some(AdminCredentials {
        email: email.trim().to_string(),
        password,
    })
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_config_parses_admins_and_code_length() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"admins":[{"email":"host@squid.test","password":"456"}],"code_length":8,"session_idle_secs":90}"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.admins().len(), 1);
        assert_eq!(config.code_length(), 8);
        assert_eq!(config.session_idle(), Duration::from_secs(90));
    }

    #[test]
    fn missing_keys_use_defaults() {
        let raw: RawConfig = serde_json::from_str("{}").unwrap();
        let config = AppConfig::from(raw);
        assert!(config.admins().is_empty());
        assert_eq!(config.code_length(), DEFAULT_CODE_LENGTH);
        assert_eq!(
            config.session_idle(),
            Duration::from_secs(DEFAULT_SESSION_IDLE_SECS)
        );
    }

    #[test]
    fn code_length_is_clamped() {
        assert_eq!(AppConfig::new(Vec::new(), 1).code_length(), MIN_CODE_LENGTH);
        assert_eq!(AppConfig::new(Vec::new(), 64).code_length(), MAX_CODE_LENGTH);
    }
}
