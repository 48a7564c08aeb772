//! Git working copy backed by `git2`.
//!
//! Listings and change detection use libgit2 directly; the pull goes through
//! the `git` CLI so it honours the user's merge configuration and hooks.

use async_trait::async_trait;
use git2::{
    CredentialType, Cred, Direction, FetchOptions, ObjectType, RemoteCallbacks, Repository,
    StatusOptions, TreeWalkMode, TreeWalkResult,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::docker::CommandExecutor;
use crate::error::{GitopsError, RepoError, Result};

use super::source::ManifestRepository;

/// File name that marks a deployment directory.
pub const MANIFEST_FILE: &str = "docker-compose.yml";

/// Remote tracked by the daemon.
const REMOTE: &str = "origin";

/// Credential callback invocations allowed per operation.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Basic credentials taken from the remote URL.
#[derive(Clone, PartialEq, Eq)]
pub struct GitCredentials {
    /// Username.
    pub username: String,
    /// Password or token.
    pub password: String,
}

impl std::fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
struct RepoConfig {
    path: PathBuf,
    branch: String,
    credentials: Option<GitCredentials>,
}

impl RepoConfig {
    fn open(&self) -> Result<Repository> {
        Repository::open(&self.path).map_err(|e| RepoError::git("open", &e).into())
    }

    fn local_ref(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }

    fn remote_ref(&self) -> String {
        format!("refs/remotes/{REMOTE}/{}", self.branch)
    }
}

/// A git working copy whose `origin` remote holds the desired state.
#[derive(Debug, Clone)]
pub struct GitRepository {
    /// Shared immutable configuration.
    config: Arc<RepoConfig>,
    /// Runner for git CLI commands.
    executor: CommandExecutor,
}

impl GitRepository {
    /// Opens the working copy at `path` tracking `branch` on `origin`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist, is not a git repository,
    /// or has no `origin` remote URL.
    pub fn open(path: impl Into<PathBuf>, branch: impl Into<String>, executor: CommandExecutor) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(RepoError::PathDoesNotExist { path }.into());
        }

        let repo = Repository::open(&path).map_err(|e| RepoError::git("open", &e))?;
        let remote = repo
            .find_remote(REMOTE)
            .map_err(|e| RepoError::git("find remote", &e))?;
        let url = remote
            .url()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| RepoError::MissingRemoteUrl {
                remote: REMOTE.to_string(),
            })?;

        let credentials = origin_credentials(url);
        if credentials.is_none() {
            debug!("No credentials in remote URL, relying on ssh-agent or git defaults");
        }

        let executor = executor.with_dir(&path);
        Ok(Self {
            config: Arc::new(RepoConfig {
                path,
                branch: branch.into(),
                credentials,
            }),
            executor,
        })
    }

    /// Returns the working copy path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Returns the tracked branch.
    #[must_use]
    pub fn branch(&self) -> &str {
        &self.config.branch
    }

    /// Verifies that the remote answers with the configured credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote cannot be listed.
    pub async fn verify_remote_access(&self) -> Result<()> {
        self.remote_blocking("connect", |config| {
            let repo = config.open()?;
            let mut remote = repo
                .find_remote(REMOTE)
                .map_err(|e| RepoError::git("find remote", &e))?;
            let connection = remote
                .connect_auth(Direction::Fetch, Some(callbacks(config.credentials.clone())), None)
                .map_err(|e| RepoError::git("connect", &e))?;
            let heads = connection
                .list()
                .map_err(|e| RepoError::git("list remote", &e))?;
            debug!(refs = heads.len(), "Remote reachable");
            Ok(())
        })
        .await
    }

    /// Verifies that the `git` CLI can reach the remote.
    ///
    /// # Errors
    ///
    /// Returns an error if `git ls-remote` fails.
    pub async fn verify_git_cli(&self) -> Result<()> {
        self.executor
            .run_checked("git", &["ls-remote", "--heads", REMOTE], None)
            .await
            .map_err(|e| RepoError::Command {
                command: String::from("ls-remote"),
                stderr: e.to_string(),
            })?;
        Ok(())
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&RepoConfig) -> Result<T> + Send + 'static,
    {
        let config = Arc::clone(&self.config);
        tokio::task::spawn_blocking(move || f(&config))
            .await
            .map_err(|e| GitopsError::internal(format!("git task failed: {e}")))?
    }

    /// Like [`Self::blocking`], bounded by the command timeout. On expiry
    /// the libgit2 call is left to finish on the blocking pool.
    async fn remote_blocking<T, F>(&self, operation: &str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&RepoConfig) -> Result<T> + Send + 'static,
    {
        with_deadline(operation, self.executor.timeout(), self.blocking(f)).await
    }
}

/// Awaits `future`, failing with [`RepoError::Timeout`] after `timeout`.
async fn with_deadline<T>(
    operation: &str,
    timeout: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, future).await.map_err(|_| {
        warn!(operation, timeout_secs = timeout.as_secs(), "Git remote operation timed out");
        RepoError::Timeout {
            operation: operation.to_string(),
            timeout,
        }
    })?
}

#[async_trait]
impl ManifestRepository for GitRepository {
    async fn list_local_manifests(&self) -> Result<Vec<PathBuf>> {
        self.blocking(|config| list_manifests(config, &config.local_ref()))
            .await
    }

    async fn list_remote_manifests(&self) -> Result<Vec<PathBuf>> {
        self.blocking(|config| list_manifests(config, &config.remote_ref()))
            .await
    }

    async fn has_remote_changes(&self) -> Result<bool> {
        self.remote_blocking("fetch", |config| {
            let repo = config.open()?;
            ensure_clean(&repo, &config.path)?;
            fetch(&repo, config)?;

            let local = resolve(&repo, &config.local_ref())?;
            let remote = resolve(&repo, &config.remote_ref())?;
            debug!(local = %local, remote = %remote, "Compared heads");
            Ok(local != remote)
        })
        .await
    }

    async fn pull(&self) -> Result<()> {
        let branch = self.config.branch.as_str();
        let result = self
            .executor
            .run_checked("git", &["pull", "--ff-only", REMOTE, branch], None)
            .await
            .map_err(|e| RepoError::Command {
                command: String::from("pull"),
                stderr: e.to_string(),
            })?;
        info!(output = %result.output(), "Repository pulled");
        Ok(())
    }
}

/// Extracts user-info credentials from an HTTP(S) remote URL.
#[must_use]
pub fn origin_credentials(url: &str) -> Option<GitCredentials> {
    let parsed = reqwest::Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.username().is_empty() {
        return None;
    }
    Some(GitCredentials {
        username: parsed.username().to_string(),
        password: parsed.password().unwrap_or_default().to_string(),
    })
}

fn callbacks(credentials: Option<GitCredentials>) -> RemoteCallbacks<'static> {
    let mut attempts = 0usize;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str("authentication failed"));
        }

        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Some(creds) = &credentials {
                return Cred::userpass_plaintext(&creds.username, &creds.password);
            }
        }
        if allowed.contains(CredentialType::SSH_KEY) {
            if let Some(user) = username_from_url {
                return Cred::ssh_key_from_agent(user);
            }
        }
        Cred::default()
    });
    callbacks
}

fn ensure_clean(repo: &Repository, path: &Path) -> Result<()> {
    let mut options = StatusOptions::new();
    options
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);

    let statuses = repo
        .statuses(Some(&mut options))
        .map_err(|e| RepoError::git("status", &e))?;
    if statuses.is_empty() {
        Ok(())
    } else {
        warn!(changes = statuses.len(), "Working copy has local changes");
        Err(RepoError::DirtyWorktree {
            path: path.to_path_buf(),
        }
        .into())
    }
}

fn fetch(repo: &Repository, config: &RepoConfig) -> Result<()> {
    let mut remote = repo
        .find_remote(REMOTE)
        .map_err(|e| RepoError::git("find remote", &e))?;

    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks(config.credentials.clone()));

    let refspec = format!("+{}:{}", config.local_ref(), config.remote_ref());
    remote
        .fetch(&[refspec.as_str()], Some(&mut options), None)
        .map_err(|e| RepoError::git("fetch", &e).into())
}

fn resolve(repo: &Repository, refname: &str) -> Result<git2::Oid> {
    repo.refname_to_id(refname)
        .map_err(|e| RepoError::git(format!("resolve {refname}"), &e).into())
}

fn list_manifests(config: &RepoConfig, refname: &str) -> Result<Vec<PathBuf>> {
    let repo = config.open()?;
    let commit = repo
        .find_reference(refname)
        .and_then(|reference| reference.peel_to_commit())
        .map_err(|e| RepoError::git(format!("resolve {refname}"), &e))?;
    let tree = commit.tree().map_err(|e| RepoError::git("read tree", &e))?;

    let mut manifests = Vec::new();
    tree.walk(TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() == Some(ObjectType::Blob) && entry.name() == Some(MANIFEST_FILE) {
            manifests.push(config.path.join(root).join(MANIFEST_FILE));
        }
        TreeWalkResult::Ok
    })
    .map_err(|e| RepoError::git("walk tree", &e))?;

    manifests.sort();
    debug!(reference = %refname, count = manifests.len(), "Listed manifests");
    Ok(manifests)
}
