//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

use crate::deployment::DeploymentState;
use crate::docker::ManifestSnapshot;
use crate::manifest::{LoadedManifest, ManifestLabels};
use crate::metrics::{CheckStatus, CycleState};
use crate::planner::DiffResult;
use crate::reconciler::{CycleReport, DeploymentOutcome};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Summary of one loaded manifest.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestSummary {
    /// Manifest path.
    pub path: PathBuf,
    /// Fingerprint of the resolved manifest.
    pub fingerprint: String,
    /// Deployment-wide gitops labels.
    pub labels: ManifestLabels,
    /// Services and their images.
    pub services: Vec<ServiceSummary>,
}

/// One service of a manifest summary.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSummary {
    /// Service name.
    pub service: String,
    /// Image reference.
    pub image: String,
    /// Declared pull policy.
    pub pull_policy: Option<String>,
}

impl ManifestSummary {
    /// Builds a summary from a parsed manifest and its snapshot.
    #[must_use]
    pub fn new(loaded: &LoadedManifest, snapshot: ManifestSnapshot) -> Self {
        Self {
            path: loaded.path.clone(),
            fingerprint: snapshot.fingerprint,
            labels: snapshot.labels,
            services: loaded
                .manifest
                .images()
                .into_iter()
                .map(|image| ServiceSummary {
                    service: image.service,
                    image: image.image,
                    pull_policy: image.pull_policy.map(String::from),
                })
                .collect(),
        }
    }
}

/// Deployment row for table display.
#[derive(Tabled)]
struct DeploymentRow {
    #[tabled(rename = "Manifest")]
    manifest: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Result")]
    result: String,
}

/// Service row for table display.
#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Pull policy")]
    pull_policy: String,
}

/// Listing row for table display.
#[derive(Tabled)]
struct ListingRow {
    #[tabled(rename = "Manifest")]
    manifest: String,
    #[tabled(rename = "Membership")]
    membership: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the report of a reconciliation cycle.
    #[must_use]
    pub fn format_cycle(&self, report: &CycleReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_cycle_text(report),
        }
    }

    fn format_cycle_text(report: &CycleReport) -> String {
        let mut output = String::new();

        let status = match report.status {
            CheckStatus::Success => format!("{} Cycle {} finished", "✓".green(), report.cycle_id),
            CheckStatus::Error => format!("{} Cycle {} aborted", "✗".red(), report.cycle_id),
        };
        let _ = writeln!(output, "{status}\n");

        if let Some(error) = &report.error {
            let _ = writeln!(output, "   {}\n", error.red());
        }

        if !report.deployments.is_empty() {
            let rows: Vec<DeploymentRow> = report
                .deployments
                .iter()
                .map(|d| DeploymentRow {
                    manifest: Self::truncate(&d.path.display().to_string(), 60),
                    state: Self::format_state(d.state),
                    result: Self::format_outcome(d),
                })
                .collect();
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        output.push_str(&Self::format_counts(&report.state));

        if !report.pending_retries.is_empty() {
            let _ = write!(output, "\n{} Pending retries:\n", "⚠".yellow());
            for path in &report.pending_retries {
                let _ = writeln!(output, "   - {}", path.display());
            }
        }

        output
    }

    /// Formats the counts of a cycle on one line.
    fn format_counts(state: &CycleState) -> String {
        format!(
            "\nDeployments: {} started, {} updated, {} stopped, {} unchanged, {} failed, {} invalid, {} ignored\n",
            state.started.to_string().green(),
            state.updated.to_string().yellow(),
            state.stopped.to_string().red(),
            state.unchanged,
            state.failed.to_string().red(),
            state.invalid.to_string().red(),
            state.ignored.to_string().dimmed()
        )
    }

    /// Formats a manifest summary.
    #[must_use]
    pub fn format_manifest(&self, summary: &ManifestSummary) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!("{} Manifest is valid\n\n", "✓".green());
                let _ = writeln!(output, "   Path: {}", summary.path.display());
                let _ = writeln!(output, "   Fingerprint: {}", summary.fingerprint);
                let _ = writeln!(output, "   Ignored: {}", summary.labels.ignore);
                let _ = writeln!(output, "   Controller: {}\n", summary.labels.controller);

                let rows: Vec<ServiceRow> = summary
                    .services
                    .iter()
                    .map(|s| ServiceRow {
                        service: s.service.clone(),
                        image: Self::truncate(&s.image, 50),
                        pull_policy: s.pull_policy.clone().unwrap_or_else(|| String::from("-")),
                    })
                    .collect();
                if !rows.is_empty() {
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }
                output
            }
        }
    }

    /// Formats the listing diff between the local and remote heads.
    #[must_use]
    pub fn format_listing(&self, root: &Path, diff: &DiffResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(diff).unwrap_or_default(),
            OutputFormat::Text => {
                if diff.diffs.is_empty() {
                    return format!("{} No manifests found in {}\n", "⚠".yellow(), root.display());
                }

                let rows: Vec<ListingRow> = diff
                    .diffs
                    .iter()
                    .map(|d| ListingRow {
                        manifest: d
                            .path
                            .strip_prefix(root)
                            .unwrap_or(&d.path)
                            .display()
                            .to_string(),
                        membership: Self::format_membership(d.state),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                let _ = write!(
                    output,
                    "\n\n{} added, {} removed, {} retained\n",
                    diff.added.to_string().green(),
                    diff.removed.to_string().red(),
                    diff.retained
                );
                output
            }
        }
    }

    /// Formats a deployment state with color.
    fn format_state(state: DeploymentState) -> String {
        match state {
            DeploymentState::Added => "+added".green().to_string(),
            DeploymentState::Updated => "~updated".yellow().to_string(),
            DeploymentState::Removed => "-removed".red().to_string(),
            DeploymentState::Unchanged => "unchanged".dimmed().to_string(),
        }
    }

    /// Formats listing membership, where retained paths are not yet compared.
    fn format_membership(state: DeploymentState) -> String {
        match state {
            DeploymentState::Unchanged => "retained".dimmed().to_string(),
            other => Self::format_state(other),
        }
    }

    /// Formats the result of one deployment.
    fn format_outcome(outcome: &DeploymentOutcome) -> String {
        if let Some(error) = &outcome.error {
            return Self::truncate(error, 40).red().to_string();
        }
        if outcome.ignored {
            return "ignored".dimmed().to_string();
        }
        if outcome.controller {
            return "controller".yellow().to_string();
        }
        "ok".green().to_string()
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}
