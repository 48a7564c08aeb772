//! Settings validation.
//!
//! Checks settings for values that parse but cannot work, before the daemon
//! touches the repository or the container runtime.

use crate::error::{ConfigError, Result};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::settings::{
    ENV_COMMAND_TIMEOUT, ENV_DOCKER_REGISTRIES, ENV_REPOSITORY_BRANCH, ENV_REPOSITORY_PATH,
    Settings,
};

/// Timer periods below this are accepted but flagged.
const MIN_RECOMMENDED_INTERVAL_SECS: i64 = 10;

/// Validator for daemon settings.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The setting that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates daemon settings.
    ///
    /// Warnings are logged and returned in the result.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self, settings: &Settings) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_repository(settings, &mut result);
        Self::validate_registries(settings, &mut result);
        Self::validate_timing(settings, &mut result);

        for warning in &result.warnings {
            warn!("{warning}");
        }

        match result.errors.first() {
            None => {
                debug!("Settings validation passed");
                Ok(result)
            }
            Some(first) => Err(ConfigError::validation(&first.message, &first.field).into()),
        }
    }

    fn validate_repository(settings: &Settings, result: &mut ValidationResult) {
        let path = &settings.repository_path;

        if settings.running_in_docker && !path.is_absolute() {
            result.errors.push(ValidationError {
                field: ENV_REPOSITORY_PATH.to_string(),
                message: format!(
                    "Repository path '{}' must be absolute when running in docker",
                    path.display()
                ),
            });
        }

        if !is_valid_branch(&settings.repository_branch) {
            result.errors.push(ValidationError {
                field: ENV_REPOSITORY_BRANCH.to_string(),
                message: format!("'{}' is not a valid branch name", settings.repository_branch),
            });
        }
    }

    fn validate_registries(settings: &Settings, result: &mut ValidationResult) {
        let mut seen = HashSet::new();

        for (i, registry) in settings.registries.iter().enumerate() {
            let field = format!("{ENV_DOCKER_REGISTRIES}[{i}]");

            if registry.url.trim().is_empty() {
                result.errors.push(ValidationError {
                    field: field.clone(),
                    message: String::from("Registry URL cannot be empty"),
                });
            }
            if registry.username.trim().is_empty() {
                result.errors.push(ValidationError {
                    field: field.clone(),
                    message: format!("Registry '{}' has no username", registry.url),
                });
            }
            if registry.password.is_empty() {
                result.warnings.push(format!("Registry '{}' has an empty password", registry.url));
            }
            if !seen.insert(registry.url.as_str()) {
                result.warnings.push(format!(
                    "Registry '{}' is listed more than once, every entry is logged in",
                    registry.url
                ));
            }
        }
    }

    fn validate_timing(settings: &Settings, result: &mut ValidationResult) {
        if settings.command_timeout.is_zero() {
            result.errors.push(ValidationError {
                field: ENV_COMMAND_TIMEOUT.to_string(),
                message: String::from("Command timeout must be at least 1 second"),
            });
        }

        match settings.check_interval() {
            None if !settings.webhook_enabled => result.warnings.push(String::from(
                "Timer and webhook are both disabled, only the startup cycle will run",
            )),
            Some(_) if settings.check_interval_secs < MIN_RECOMMENDED_INTERVAL_SECS => {
                result.warnings.push(format!(
                    "Check interval of {}s is very short",
                    settings.check_interval_secs
                ));
            }
            _ => {}
        }
    }
}

/// Validates a branch name against the common git ref rules.
fn is_valid_branch(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && !name.starts_with('/')
        && !name.ends_with('/')
        && !name.ends_with(".lock")
        && !name.contains("..")
        && !name.contains("//")
        && !name.contains("@{")
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c))
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryCredentials;
    use std::collections::HashMap;
    use std::time::Duration;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Settings::from_map(&vars).expect("settings")
    }

    #[test]
    fn test_valid_branch() {
        assert!(is_valid_branch("main"));
        assert!(is_valid_branch("release/2024-10"));
        assert!(is_valid_branch("feature_x"));
    }

    #[test]
    fn test_invalid_branch() {
        assert!(!is_valid_branch(""));
        assert!(!is_valid_branch("-main"));
        assert!(!is_valid_branch("has space"));
        assert!(!is_valid_branch("a..b"));
        assert!(!is_valid_branch("topic.lock"));
        assert!(!is_valid_branch("refs/"));
    }

    #[test]
    fn test_relative_path_rejected_in_docker() {
        let validator = ConfigValidator::new();

        let outside = settings(&[("REPOSITORY_PATH", "./deployments")]);
        assert!(validator.validate(&outside).is_ok());

        let inside = settings(&[
            ("REPOSITORY_PATH", "./deployments"),
            ("IS_RUNNING_IN_DOCKER", "true"),
        ]);
        let err = validator.validate(&inside).expect_err("should fail");
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn test_registry_checks() {
        let validator = ConfigValidator::new();
        let mut config = settings(&[("REPOSITORY_PATH", "/srv")]);

        config.registries = vec![
            RegistryCredentials {
                url: String::from("ghcr.io"),
                username: String::from("bot"),
                password: String::new(),
            },
            RegistryCredentials {
                url: String::from("ghcr.io"),
                username: String::from("bot"),
                password: String::from("token"),
            },
        ];
        let result = validator.validate(&config).expect("valid with warnings");
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 2);

        config.registries[0].username = String::new();
        assert!(validator.validate(&config).is_err());
    }

    #[test]
    fn test_zero_command_timeout() {
        let mut config = settings(&[("REPOSITORY_PATH", "/srv")]);
        config.command_timeout = Duration::ZERO;
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_no_triggers_warning() {
        let config = settings(&[
            ("REPOSITORY_PATH", "/srv"),
            ("CHECK_INTERVAL_IN_SECONDS", "0"),
            ("WEBHOOK_ENABLED", "false"),
        ]);
        let result = ConfigValidator::new().validate(&config).expect("valid");
        assert_eq!(result.warning_count(), 1);
    }
}
