//! gitops-compose CLI entrypoint.
//!
//! This is the main entrypoint for the gitops-compose daemon and its
//! inspection commands.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use gitops_compose::cli::{Cli, Commands, ManifestSummary, OutputFormatter};
use gitops_compose::config::{
    ConfigValidator, ENV_LOG_FORMAT, ENV_LOG_LEVEL, LogFormat, LogLevel, Settings, load_dotenv,
};
use gitops_compose::docker::{
    CommandExecutor, ComposeStack, RegistryAuthenticator, RegistryClient, Stack,
};
use gitops_compose::error::{GitopsError, Result};
use gitops_compose::git::{GitRepository, ManifestRepository};
use gitops_compose::manifest::ManifestParser;
use gitops_compose::metrics::{MetricsSink, PrometheusMetrics, StatusBoard};
use gitops_compose::planner::DiffEngine;
use gitops_compose::reconciler::Reconciler;
use gitops_compose::scheduler::{Scheduler, TriggerSource};
use gitops_compose::server::{AppState, Server, shutdown_signal};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    if let Err(e) = load_dotenv(&cli.env_file) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    // Initialize logging
    init_logging(log_format_from_env(), log_level_from_env(), cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "gitops-compose failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Reads the log format leniently; settings validation reports bad values.
fn log_format_from_env() -> LogFormat {
    std::env::var(ENV_LOG_FORMAT)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

/// Reads the log level leniently; settings validation reports bad values.
fn log_level_from_env() -> LogLevel {
    std::env::var(ENV_LOG_LEVEL)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

/// Initializes the logging system.
///
/// `RUST_LOG` overrides the configured level; `--verbose` overrides both.
fn init_logging(format: LogFormat, level: LogLevel, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.with_ansi(false).init(),
        LogFormat::Console => builder.with_ansi(true).init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command() {
        Commands::Run => cmd_run(load_settings()?).await,
        Commands::Check => cmd_check(load_settings()?, &formatter).await,
        Commands::Validate { manifest } => cmd_validate(&manifest, &formatter).await,
        Commands::Manifests => cmd_manifests(load_settings()?, &formatter).await,
    }
}

/// Loads and validates settings from the environment.
fn load_settings() -> Result<Settings> {
    let settings = Settings::from_lookup(|name| std::env::var(name).ok())?;
    let result = ConfigValidator::new().validate(&settings)?;
    info!(warnings = result.warning_count(), "Settings loaded");
    Ok(settings)
}

/// Runtime collaborators built from settings.
struct Components {
    repository: Arc<GitRepository>,
    stack: Arc<ComposeStack>,
    registry: Arc<RegistryClient>,
}

impl Components {
    fn build(settings: &Settings) -> Result<Self> {
        let executor = CommandExecutor::new(settings.command_timeout);
        let repository = GitRepository::open(
            &settings.repository_path,
            &settings.repository_branch,
            executor.clone(),
        )?;
        info!(
            path = %repository.path().display(),
            branch = repository.branch(),
            "Deployment repository opened"
        );

        Ok(Self {
            repository: Arc::new(repository),
            stack: Arc::new(ComposeStack::new(executor.clone())),
            registry: Arc::new(RegistryClient::new(executor, settings.registries.clone())),
        })
    }

    /// Verifies every external dependency before the first cycle.
    async fn verify(&self, settings: &Settings) -> Result<()> {
        self.repository.verify_remote_access().await?;
        self.repository.verify_git_cli().await?;
        info!("Git remote access verified");

        let version = self.registry.verify_daemon().await?;
        info!(version = %version, "Docker daemon connection verified");
        self.registry.verify_compose_cli().await?;

        if settings.running_in_docker && self.registry.is_docker_desktop().await? {
            warn!("Docker is running in Docker Desktop, volume mounts might cause issues");
        }

        if self.registry.login_if_credentials_set().await? {
            info!(
                registries = self.registry.registry_count(),
                "Docker registry credentials verified"
            );
        }
        Ok(())
    }

    fn reconciler(&self, metrics: Arc<dyn MetricsSink>) -> Reconciler {
        Reconciler::new(
            self.repository.clone(),
            self.stack.clone(),
            self.registry.clone(),
            metrics,
        )
    }
}

/// Runs the daemon until SIGINT or SIGTERM.
async fn cmd_run(settings: Settings) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "Starting gitops-compose");

    let components = Components::build(&settings)?;
    components.verify(&settings).await?;

    let metrics = PrometheusMetrics::new()?;
    let status = StatusBoard::new();
    info!(instance = %status.instance_id(), "Status board initialised");

    let reconciler = components
        .reconciler(Arc::new(metrics.clone()))
        .with_status(status.clone());
    let (scheduler, trigger) = Scheduler::new(reconciler, settings.check_interval());

    let mut state = AppState::new(trigger, status).with_webhook(settings.webhook_enabled);
    if settings.metrics_enabled {
        state = state.with_metrics(metrics);
        info!(url = "/metrics", "Metrics enabled");
    }
    if settings.webhook_enabled {
        info!(url = "/webhook", "Webhook enabled");
    }

    let server = Server::bind(settings.listen_address, state).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = tokio::spawn(scheduler.run(shutdown_rx.clone()));
    let http = tokio::spawn(server.run(shutdown_rx));

    shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        debug!("All shutdown receivers already dropped");
    }

    match http.await {
        Ok(result) => result?,
        Err(e) => return Err(GitopsError::internal(format!("HTTP server task failed: {e}"))),
    }
    worker
        .await
        .map_err(|e| GitopsError::internal(format!("scheduler task failed: {e}")))?;

    info!("gitops-compose gracefully stopped");
    Ok(())
}

/// Runs one full reconciliation cycle.
async fn cmd_check(settings: Settings, formatter: &OutputFormatter) -> Result<()> {
    let components = Components::build(&settings)?;
    components.verify(&settings).await?;

    let mut reconciler = components.reconciler(Arc::new(PrometheusMetrics::new()?));
    let report = reconciler.run_cycle(TriggerSource::Manual).await;

    write_stdout(&formatter.format_cycle(&report))?;
    match report.error {
        Some(error) => Err(GitopsError::internal(error)),
        None => Ok(()),
    }
}

/// Loads one manifest and prints its fingerprint and labels.
async fn cmd_validate(manifest: &Path, formatter: &OutputFormatter) -> Result<()> {
    let path = std::path::absolute(manifest)?;
    let loaded = ManifestParser::new().load_file(&path)?;

    let stack = ComposeStack::new(CommandExecutor::new(std::time::Duration::from_secs(60)));
    let snapshot = stack.load_config(&path).await?;

    write_stdout(&formatter.format_manifest(&ManifestSummary::new(&loaded, snapshot)))
}

/// Prints the manifest listings at the local and remote heads.
async fn cmd_manifests(settings: Settings, formatter: &OutputFormatter) -> Result<()> {
    let components = Components::build(&settings)?;

    if components.repository.has_remote_changes().await? {
        info!("Remote head differs from the local head");
    }
    let local = components.repository.list_local_manifests().await?;
    let remote = components.repository.list_remote_manifests().await?;
    let diff = DiffEngine::new().compute_diff(&local, &remote);

    write_stdout(&formatter.format_listing(components.repository.path(), &diff))
}

/// Writes command output to stdout.
fn write_stdout(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}
