//! Configuration module for the gitops-compose daemon.
//!
//! This module handles process configuration:
//! - Loading settings from environment variables and an optional `.env` file
//! - Validating settings before startup

mod settings;
mod validator;

pub use settings::{
    ENV_CHECK_INTERVAL, ENV_COMMAND_TIMEOUT, ENV_DOCKER_REGISTRIES, ENV_LISTEN_ADDRESS,
    ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_METRICS_ENABLED, ENV_REPOSITORY_BRANCH,
    ENV_REPOSITORY_PATH, ENV_RUNNING_IN_DOCKER, ENV_WEBHOOK_ENABLED, LogFormat, LogLevel,
    RegistryCredentials, Settings, load_dotenv,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
