//! Registry login and docker daemon checks.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::RegistryCredentials;
use crate::error::{Result, StackError};

use super::executor::CommandExecutor;
use super::stack::RegistryAuthenticator;

const DOCKER: &str = "docker";

/// Docker CLI client for registry login and daemon checks.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    /// Command runner.
    executor: CommandExecutor,
    /// Configured registries.
    registries: Vec<RegistryCredentials>,
}

impl RegistryClient {
    /// Creates a registry client.
    #[must_use]
    pub const fn new(executor: CommandExecutor, registries: Vec<RegistryCredentials>) -> Self {
        Self {
            executor,
            registries,
        }
    }

    /// Returns the number of configured registries.
    #[must_use]
    pub fn registry_count(&self) -> usize {
        self.registries.len()
    }

    /// Verifies that the docker daemon answers.
    ///
    /// # Errors
    ///
    /// Returns an error if `docker info` fails.
    pub async fn verify_daemon(&self) -> Result<String> {
        let result = self
            .executor
            .run_checked(DOCKER, &["info", "--format", "{{.ServerVersion}}"], None)
            .await
            .map_err(|e| StackError::DaemonUnreachable {
                message: e.to_string(),
            })?;
        let version = result.stdout.trim().to_string();
        debug!(version = %version, "Docker daemon reachable");
        Ok(version)
    }

    /// Checks whether the daemon is provided by Docker Desktop.
    ///
    /// # Errors
    ///
    /// Returns an error if `docker info` fails.
    pub async fn is_docker_desktop(&self) -> Result<bool> {
        let result = self
            .executor
            .run_checked(DOCKER, &["info", "--format", "{{.OperatingSystem}}"], None)
            .await?;
        Ok(is_desktop_os(&result.stdout))
    }

    /// Verifies that the compose plugin is installed.
    ///
    /// # Errors
    ///
    /// Returns an error if `docker compose version` fails or does not
    /// identify itself as Docker Compose.
    pub async fn verify_compose_cli(&self) -> Result<()> {
        let result = self
            .executor
            .run(DOCKER, &["compose", "version"], None)
            .await?;
        if result.success && result.stdout.contains("Docker Compose") {
            Ok(())
        } else {
            Err(StackError::CommandFailed {
                command: String::from("docker compose version"),
                output: format!("docker compose cli is not working: {}", result.output()),
            }
            .into())
        }
    }
}

#[async_trait]
impl RegistryAuthenticator for RegistryClient {
    async fn login_if_credentials_set(&self) -> Result<bool> {
        if self.registries.is_empty() {
            return Ok(false);
        }

        for registry in &self.registries {
            self.executor
                .run_checked(
                    DOCKER,
                    &[
                        "login",
                        registry.url.as_str(),
                        "--username",
                        registry.username.as_str(),
                        "--password-stdin",
                    ],
                    Some(registry.password.as_str()),
                )
                .await
                .map_err(|e| StackError::Login {
                    registry: registry.url.clone(),
                    message: e.to_string(),
                })?;
            info!(registry = %registry.url, "Logged in to registry");
        }

        Ok(true)
    }
}

fn is_desktop_os(operating_system: &str) -> bool {
    operating_system.to_lowercase().contains("docker desktop")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_desktop_detection() {
        assert!(is_desktop_os("Docker Desktop\n"));
        assert!(!is_desktop_os("Ubuntu 24.04.1 LTS"));
    }

    #[tokio::test]
    async fn test_login_without_registries_is_noop() {
        let client = RegistryClient::new(CommandExecutor::new(Duration::from_secs(1)), Vec::new());
        assert!(!client.login_if_credentials_set().await.expect("login"));
        assert_eq!(client.registry_count(), 0);
    }
}
