//! Error types for the gitops-compose daemon.
//!
//! Errors fall into two groups. Cycle-level errors (settings, repository,
//! registry login) abort the current reconciliation cycle. Deployment-level
//! errors ([`DeployError`]) are recorded on the deployment and never stop the
//! remaining deployments of a cycle.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for the gitops-compose daemon.
#[derive(Debug, Error)]
pub enum GitopsError {
    /// Process configuration errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Manifest loading errors.
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Repository errors.
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),

    /// Container runtime errors.
    #[error("Stack error: {0}")]
    Stack(#[from] StackError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Process configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// An environment variable holds a value that cannot be parsed.
    #[error("Invalid value for {name}: {message}")]
    InvalidValue {
        /// Name of the variable.
        name: String,
        /// Description of the problem.
        message: String,
    },

    /// The `.env` file could not be loaded.
    #[error("Failed to load {path}: {message}")]
    DotEnv {
        /// Path of the `.env` file.
        path: PathBuf,
        /// Description of the error.
        message: String,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Setting that failed validation.
        field: Option<String>,
    },
}

/// Errors raised while loading a compose manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file does not exist.
    #[error("Manifest not found: {path}")]
    FileNotFound {
        /// Path of the missing manifest.
        path: PathBuf,
    },

    /// The manifest could not be read.
    #[error("Failed to read manifest {path}: {message}")]
    Read {
        /// Path of the manifest.
        path: PathBuf,
        /// Description of the IO error.
        message: String,
    },

    /// The manifest is not valid YAML or does not match the compose layout.
    #[error("Failed to parse manifest: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Variable interpolation failed.
    #[error("Interpolation failed for ${{{variable}}}: {message}")]
    Interpolation {
        /// The variable being substituted.
        variable: String,
        /// Description of the failure.
        message: String,
    },

    /// The manifest declares no services.
    #[error("Manifest {path} declares no services")]
    NoServices {
        /// Path of the manifest.
        path: PathBuf,
    },
}

/// Repository errors.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The repository path does not exist.
    #[error("Repository path does not exist: {path}")]
    PathDoesNotExist {
        /// The configured path.
        path: PathBuf,
    },

    /// The working copy has uncommitted modifications.
    #[error("Local changes detected in {path}, refusing to reconcile")]
    DirtyWorktree {
        /// The repository path.
        path: PathBuf,
    },

    /// The configured remote has no URL.
    #[error("Remote '{remote}' has no URL")]
    MissingRemoteUrl {
        /// Remote name.
        remote: String,
    },

    /// A git operation failed.
    #[error("Git {operation} failed: {message}")]
    Git {
        /// The operation that failed.
        operation: String,
        /// Description of the failure.
        message: String,
    },

    /// The git CLI returned an error.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git sub-command.
        command: String,
        /// Captured standard error.
        stderr: String,
    },

    /// A remote operation did not finish in time.
    #[error("Git {operation} timed out after {timeout:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The configured bound.
        timeout: Duration,
    },
}

/// Container runtime errors.
#[derive(Debug, Error)]
pub enum StackError {
    /// A command could not be spawned.
    #[error("Failed to spawn {program}: {message}")]
    Spawn {
        /// Program name.
        program: String,
        /// Description of the failure.
        message: String,
    },

    /// A command exited unsuccessfully.
    #[error("{command} failed: {output}")]
    CommandFailed {
        /// The command line that failed.
        command: String,
        /// Combined output of the command.
        output: String,
    },

    /// A command did not finish in time.
    #[error("{command} timed out after {timeout:?}")]
    Timeout {
        /// The command line that timed out.
        command: String,
        /// The configured bound.
        timeout: Duration,
    },

    /// An image pull failed.
    #[error("Failed to pull image {image}: {message}")]
    ImagePull {
        /// Image reference.
        image: String,
        /// Description of the failure.
        message: String,
    },

    /// Registry login failed.
    #[error("Registry login to {registry} failed: {message}")]
    Login {
        /// Registry URL.
        registry: String,
        /// Description of the failure.
        message: String,
    },

    /// A manifest path cannot be passed to the compose CLI.
    #[error("Manifest path is not valid UTF-8: {}", path.display())]
    InvalidPath {
        /// The offending path.
        path: PathBuf,
    },

    /// The docker daemon is not reachable.
    #[error("Docker daemon is not reachable: {message}")]
    DaemonUnreachable {
        /// Description of the failure.
        message: String,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A cycle precondition failed before any stack was touched in that phase.
    #[error("Reconciliation aborted during {phase}: {reason}")]
    Aborted {
        /// Phase of the cycle that failed.
        phase: CyclePhase,
        /// Reason for abort.
        reason: String,
    },
}

/// Phases of a reconciliation cycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    /// Checking the remote for new commits.
    ChangeDetection,
    /// Listing manifests at the local and remote heads.
    Listing,
    /// Logging in to container registries.
    RegistryLogin,
    /// Pulling the repository.
    RepositoryPull,
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ChangeDetection => "change detection",
            Self::Listing => "manifest listing",
            Self::RegistryLogin => "registry login",
            Self::RepositoryPull => "repository pull",
        };
        write!(f, "{s}")
    }
}

/// Outcome classification of a failed deployment apply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeployError {
    /// The manifest failed to load; the deployment is never applied.
    #[error("invalid compose file")]
    InvalidManifest,

    /// An image could not be pulled; the deployment is retried next cycle.
    #[error("image pull backoff")]
    ImagePullBackoff,

    /// Any other failure while applying.
    #[error("{0}")]
    Failed(String),
}

impl DeployError {
    /// Returns true if the deployment should be retried on the next idle cycle.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ImagePullBackoff)
    }
}

impl From<StackError> for DeployError {
    fn from(err: StackError) -> Self {
        match err {
            StackError::ImagePull { .. } => Self::ImagePullBackoff,
            other => Self::Failed(other.to_string()),
        }
    }
}

/// Result type alias for gitops-compose operations.
pub type Result<T> = std::result::Result<T, GitopsError>;

impl GitopsError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wraps this error as an aborted cycle in the given phase.
    #[must_use]
    pub fn aborted(self, phase: CyclePhase) -> Self {
        match self {
            Self::Reconcile(_) => self,
            other => Self::Reconcile(ReconcileError::Aborted {
                phase,
                reason: other.to_string(),
            }),
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific setting.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl RepoError {
    /// Creates a git error for an operation.
    #[must_use]
    pub fn git(operation: impl Into<String>, err: &git2::Error) -> Self {
        Self::Git {
            operation: operation.into(),
            message: err.message().to_string(),
        }
    }
}
