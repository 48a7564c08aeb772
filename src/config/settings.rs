//! Process settings loaded from environment variables.
//!
//! Settings are read through a lookup function so they can be parsed from a
//! fixed map in tests. [`Settings::from_env`] loads an optional `.env` file
//! from the working directory first, then reads the process environment.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ConfigError, Result};

/// Path of the repository working copy.
pub const ENV_REPOSITORY_PATH: &str = "REPOSITORY_PATH";
/// Tracked branch.
pub const ENV_REPOSITORY_BRANCH: &str = "REPOSITORY_BRANCH";
/// Timer period in seconds.
pub const ENV_CHECK_INTERVAL: &str = "CHECK_INTERVAL_IN_SECONDS";
/// Webhook toggle.
pub const ENV_WEBHOOK_ENABLED: &str = "WEBHOOK_ENABLED";
/// Metrics toggle.
pub const ENV_METRICS_ENABLED: &str = "METRICS_ENABLED";
/// Registry credentials as JSON.
pub const ENV_DOCKER_REGISTRIES: &str = "DOCKER_REGISTRIES";
/// Container mode flag.
pub const ENV_RUNNING_IN_DOCKER: &str = "IS_RUNNING_IN_DOCKER";
/// Log formatter.
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
/// Log level.
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
/// HTTP bind address.
pub const ENV_LISTEN_ADDRESS: &str = "LISTEN_ADDRESS";
/// Bound on every external command, in seconds.
pub const ENV_COMMAND_TIMEOUT: &str = "COMMAND_TIMEOUT_IN_SECONDS";

const DEFAULT_BRANCH: &str = "main";
const DEFAULT_CHECK_INTERVAL_SECS: i64 = 300;
const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:2112";
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 600;

/// Daemon settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Git working copy containing the manifests.
    pub repository_path: PathBuf,
    /// Branch tracked on `origin`.
    pub repository_branch: String,
    /// Timer period in seconds; zero or negative disables the timer.
    pub check_interval_secs: i64,
    /// Whether `/webhook` is exposed.
    pub webhook_enabled: bool,
    /// Whether `/metrics` is exposed.
    pub metrics_enabled: bool,
    /// Registries to log in to before each cycle.
    pub registries: Vec<RegistryCredentials>,
    /// Whether the daemon runs inside a container.
    pub running_in_docker: bool,
    /// Log formatter.
    pub log_format: LogFormat,
    /// Log level.
    pub log_level: LogLevel,
    /// HTTP bind address.
    pub listen_address: SocketAddr,
    /// Bound on every external command.
    pub command_timeout: Duration,
}

/// Credentials for one container registry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCredentials {
    /// Registry URL, e.g. `ghcr.io`.
    pub url: String,
    /// Username.
    pub username: String,
    /// Password or token.
    pub password: String,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Plain text without colors.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
    /// Colored, human-friendly output.
    Console,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "console" => Ok(Self::Console),
            other => Err(format!("unknown log format '{other}', expected text, json or console")),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug and above.
    Debug,
    /// Info and above.
    #[default]
    Info,
    /// Warnings and errors.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// Returns the filter directive for this level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

impl Settings {
    /// Loads settings from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first; variables
    /// already set in the environment take precedence over it.
    ///
    /// # Errors
    ///
    /// Returns an error if the `.env` file is malformed or a variable is
    /// missing or invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_env_file(Path::new(".env"))
    }

    /// Loads settings from the process environment after loading the given
    /// `.env` file, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the `.env` file is malformed or a variable is
    /// missing or invalid.
    pub fn from_env_file(path: &Path) -> Result<Self> {
        load_dotenv(path)?;
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Parses settings from a fixed map.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is missing or invalid.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|name| vars.get(name).cloned())
    }

    /// Parses settings through a lookup function.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let repository_path = get(ENV_REPOSITORY_PATH)
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingEnvVar {
                name: ENV_REPOSITORY_PATH.to_string(),
            })?;

        let repository_branch =
            get(ENV_REPOSITORY_BRANCH).unwrap_or_else(|| DEFAULT_BRANCH.to_string());

        let check_interval_secs = parse_or(get(ENV_CHECK_INTERVAL), ENV_CHECK_INTERVAL, DEFAULT_CHECK_INTERVAL_SECS)?;
        let webhook_enabled = parse_bool(get(ENV_WEBHOOK_ENABLED), ENV_WEBHOOK_ENABLED, true)?;
        let metrics_enabled = parse_bool(get(ENV_METRICS_ENABLED), ENV_METRICS_ENABLED, true)?;
        let running_in_docker = parse_bool(get(ENV_RUNNING_IN_DOCKER), ENV_RUNNING_IN_DOCKER, false)?;

        let registries = match get(ENV_DOCKER_REGISTRIES) {
            Some(raw) => serde_json::from_str::<Vec<RegistryCredentials>>(&raw)
                .map_err(|e| ConfigError::invalid(ENV_DOCKER_REGISTRIES, e.to_string()))?,
            None => Vec::new(),
        };

        let log_format = match get(ENV_LOG_FORMAT) {
            Some(raw) => raw
                .parse()
                .map_err(|e: String| ConfigError::invalid(ENV_LOG_FORMAT, e))?,
            None => LogFormat::default(),
        };
        let log_level = match get(ENV_LOG_LEVEL) {
            Some(raw) => raw
                .parse()
                .map_err(|e: String| ConfigError::invalid(ENV_LOG_LEVEL, e))?,
            None => LogLevel::default(),
        };

        let listen_address = get(ENV_LISTEN_ADDRESS)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid(ENV_LISTEN_ADDRESS, e.to_string()))?;

        let timeout_secs: u64 = parse_or(get(ENV_COMMAND_TIMEOUT), ENV_COMMAND_TIMEOUT, DEFAULT_COMMAND_TIMEOUT_SECS)?;

        let settings = Self {
            repository_path,
            repository_branch,
            check_interval_secs,
            webhook_enabled,
            metrics_enabled,
            registries,
            running_in_docker,
            log_format,
            log_level,
            listen_address,
            command_timeout: Duration::from_secs(timeout_secs),
        };

        debug!(
            repository = %settings.repository_path.display(),
            branch = %settings.repository_branch,
            interval = settings.check_interval_secs,
            registries = settings.registries.len(),
            "Settings loaded"
        );

        Ok(settings)
    }

    /// Returns the timer period, or `None` when the timer is disabled.
    #[must_use]
    pub fn check_interval(&self) -> Option<Duration> {
        u64::try_from(self.check_interval_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Loads a `.env` file into the process environment if it exists.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be parsed.
pub fn load_dotenv(path: &Path) -> Result<()> {
    if path.exists() {
        info!("Loading environment from: {}", path.display());
        dotenvy::from_path(path).map_err(|e| ConfigError::DotEnv {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    }
    Ok(())
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.map_or(Ok(default), |value| {
        value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(name, format!("'{value}': {e}")).into())
    })
}

fn parse_bool(raw: Option<String>, name: &str, default: bool) -> Result<bool> {
    let Some(value) = raw else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(name, format!("'{value}' is not a boolean")).into()),
    }
}
