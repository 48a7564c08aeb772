//! Compose stacks driven through the `docker compose` CLI.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, StackError};
use crate::manifest::{ManifestHasher, ManifestParser, PullPolicy, ServiceImage};

use super::executor::CommandExecutor;
use super::stack::{ManifestSnapshot, Stack};

const DOCKER: &str = "docker";

/// A [`Stack`] backed by `docker compose`.
#[derive(Debug)]
pub struct ComposeStack {
    /// Command runner.
    executor: CommandExecutor,
    /// Manifest loader.
    parser: ManifestParser,
    /// Fingerprint calculator.
    hasher: ManifestHasher,
}

impl ComposeStack {
    /// Creates a compose stack runtime.
    #[must_use]
    pub const fn new(executor: CommandExecutor) -> Self {
        Self {
            executor,
            parser: ManifestParser::new(),
            hasher: ManifestHasher::new(),
        }
    }

    /// Uses a custom manifest parser.
    #[must_use]
    pub fn with_parser(mut self, parser: ManifestParser) -> Self {
        self.parser = parser;
        self
    }

    async fn compose(&self, path: &Path, args: &[&str]) -> std::result::Result<String, StackError> {
        let file = path.to_str().ok_or_else(|| StackError::InvalidPath {
            path: path.to_path_buf(),
        })?;
        let mut full = vec!["compose", "-f", file];
        full.extend_from_slice(args);

        let executor = path.parent().map_or_else(|| self.executor.clone(), |dir| self.executor.with_dir(dir));
        let result = executor.run_checked(DOCKER, &full, None).await?;
        Ok(result.stdout)
    }

    async fn image_exists_locally(&self, image: &str) -> std::result::Result<bool, StackError> {
        let result = self
            .executor
            .run(DOCKER, &["image", "inspect", "--format", "{{.Id}}", image], None)
            .await?;
        Ok(result.success)
    }

    async fn should_pull(&self, image: &ServiceImage) -> bool {
        match image.pull_policy {
            Some(PullPolicy::Never | PullPolicy::Build) => false,
            Some(PullPolicy::Always | PullPolicy::Other(_)) => true,
            Some(PullPolicy::Missing) | None => match self.image_exists_locally(&image.image).await {
                Ok(exists) => !exists,
                Err(e) => {
                    debug!(image = %image.image, error = %e, "Failed to inspect local image, pulling");
                    true
                }
            },
        }
    }
}

#[async_trait]
impl Stack for ComposeStack {
    async fn load_config(&self, path: &Path) -> Result<ManifestSnapshot> {
        let loaded = self.parser.load_file(path)?;
        let watch_files = loaded.manifest.watch_files(&loaded.base_dir);
        let fingerprint = self.hasher.fingerprint(&loaded.document, &watch_files)?;

        debug!(
            file = %path.display(),
            hash = %ManifestHasher::short_hash(&fingerprint),
            watch_files = watch_files.len(),
            "Manifest loaded"
        );

        Ok(ManifestSnapshot {
            fingerprint,
            labels: loaded.manifest.gitops_labels(),
        })
    }

    async fn is_running(&self, path: &Path) -> std::result::Result<bool, StackError> {
        let output = self.compose(path, &["ps", "--quiet"]).await?;
        Ok(!output.trim().is_empty())
    }

    async fn pull_images(&self, path: &Path) -> std::result::Result<(), StackError> {
        let loaded = self.parser.load_file(path).map_err(|e| StackError::CommandFailed {
            command: String::from("load manifest"),
            output: e.to_string(),
        })?;

        for image in loaded.manifest.images() {
            if !self.should_pull(&image).await {
                debug!(service = %image.service, image = %image.image, "Image pull not required");
                continue;
            }

            info!(service = %image.service, image = %image.image, "Pulling image");
            self.executor
                .run_checked(DOCKER, &["pull", "--quiet", &image.image], None)
                .await
                .map_err(|e| StackError::ImagePull {
                    image: image.image.clone(),
                    message: e.to_string(),
                })?;
        }

        Ok(())
    }

    async fn start(&self, path: &Path) -> std::result::Result<(), StackError> {
        self.compose(path, &["up", "-d", "--remove-orphans"]).await?;
        Ok(())
    }

    async fn stop(&self, path: &Path) -> std::result::Result<(), StackError> {
        self.compose(path, &["down"]).await?;
        Ok(())
    }
}
