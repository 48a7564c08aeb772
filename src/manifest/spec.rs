//! Typed view of a compose manifest.
//!
//! Only the parts of the compose format that the daemon acts on are modelled:
//! service images, pull policies, labels, and the files a service depends on.
//! Every other key is accepted and ignored, so any valid compose file parses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Label that excludes a deployment from every apply operation.
pub const LABEL_IGNORE: &str = "gitops.ignore";

/// Label that marks the deployment running this daemon.
pub const LABEL_CONTROLLER: &str = "gitops.controller";

/// Name of the dotenv file read next to each manifest.
pub const DOTENV_FILE: &str = ".env";

/// The subset of a compose file the daemon understands.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComposeManifest {
    /// Optional project name.
    #[serde(default)]
    pub name: Option<String>,
    /// Services keyed by name.
    #[serde(default)]
    pub services: BTreeMap<String, ServiceSpec>,
    /// Top-level configs.
    #[serde(default)]
    pub configs: BTreeMap<String, Option<FileResource>>,
    /// Top-level secrets.
    #[serde(default)]
    pub secrets: BTreeMap<String, Option<FileResource>>,
}

/// A single service of a compose manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceSpec {
    /// Image reference, absent for build-only services.
    #[serde(default)]
    pub image: Option<String>,
    /// When to pull the image.
    #[serde(default)]
    pub pull_policy: Option<PullPolicy>,
    /// Service labels, in map or list form.
    #[serde(default)]
    pub labels: Labels,
    /// Environment files loaded into the container.
    #[serde(default)]
    pub env_file: EnvFiles,
}

/// A config or secret backed by a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileResource {
    /// Path of the backing file, relative to the manifest directory.
    #[serde(default)]
    pub file: Option<String>,
}

/// Image pull policy of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PullPolicy {
    /// Always pull.
    Always,
    /// Never pull.
    Never,
    /// Pull only when the image is not present locally.
    Missing,
    /// Build the image instead of pulling.
    Build,
    /// Any other policy (e.g. `daily`), treated as `Always`.
    Other(String),
}

impl From<String> for PullPolicy {
    fn from(value: String) -> Self {
        match value.as_str() {
            "always" => Self::Always,
            "never" => Self::Never,
            "missing" | "if_not_present" => Self::Missing,
            "build" => Self::Build,
            _ => Self::Other(value),
        }
    }
}

impl From<PullPolicy> for String {
    fn from(policy: PullPolicy) -> Self {
        match policy {
            PullPolicy::Always => Self::from("always"),
            PullPolicy::Never => Self::from("never"),
            PullPolicy::Missing => Self::from("missing"),
            PullPolicy::Build => Self::from("build"),
            PullPolicy::Other(value) => value,
        }
    }
}

/// Service labels.
///
/// Compose accepts both `key: value` maps and `["key=value"]` lists; both are
/// normalised into a string map. Non-string scalar values are stringified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawLabels")]
pub struct Labels(BTreeMap<String, String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLabels {
    Map(BTreeMap<String, Option<serde_yaml::Value>>),
    List(Vec<String>),
}

impl From<RawLabels> for Labels {
    fn from(raw: RawLabels) -> Self {
        let map = match raw {
            RawLabels::Map(map) => map
                .into_iter()
                .map(|(k, v)| (k, v.as_ref().map(scalar_to_string).unwrap_or_default()))
                .collect(),
            RawLabels::List(list) => list
                .into_iter()
                .map(|entry| match entry.split_once('=') {
                    Some((k, v)) => (k.to_string(), v.to_string()),
                    None => (entry, String::new()),
                })
                .collect(),
        };
        Self(map)
    }
}

fn scalar_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

impl Labels {
    /// Returns the value of a label.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns true if the label is set to exactly `true`.
    #[must_use]
    pub fn is_true(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Labels {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

/// Environment files of a service (`env_file`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawEnvFiles")]
pub struct EnvFiles(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEnvFiles {
    Single(String),
    Many(Vec<RawEnvFile>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEnvFile {
    Path(String),
    Detailed { path: String },
}

impl From<RawEnvFiles> for EnvFiles {
    fn from(raw: RawEnvFiles) -> Self {
        match raw {
            RawEnvFiles::Single(path) => Self(vec![path]),
            RawEnvFiles::Many(entries) => Self(
                entries
                    .into_iter()
                    .map(|e| match e {
                        RawEnvFile::Path(path) | RawEnvFile::Detailed { path } => path,
                    })
                    .collect(),
            ),
        }
    }
}

impl EnvFiles {
    /// Iterates over the declared paths.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Deployment-wide signals scanned from service labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ManifestLabels {
    /// Set when any service carries `gitops.ignore=true`.
    pub ignore: bool,
    /// Set when any service carries `gitops.controller=true`.
    pub controller: bool,
}

/// An image a service runs, with its pull policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceImage {
    /// Service name.
    pub service: String,
    /// Image reference.
    pub image: String,
    /// Pull policy, `None` when not declared.
    pub pull_policy: Option<PullPolicy>,
}

impl ComposeManifest {
    /// Scans all services for the recognised gitops labels.
    #[must_use]
    pub fn gitops_labels(&self) -> ManifestLabels {
        self.services
            .values()
            .fold(ManifestLabels::default(), |acc, service| ManifestLabels {
                ignore: acc.ignore || service.labels.is_true(LABEL_IGNORE),
                controller: acc.controller || service.labels.is_true(LABEL_CONTROLLER),
            })
    }

    /// Lists service images in service-name order, deduplicated.
    #[must_use]
    pub fn images(&self) -> Vec<ServiceImage> {
        let mut seen = std::collections::HashSet::new();
        self.services
            .iter()
            .filter_map(|(name, service)| {
                let image = service.image.as_ref()?;
                seen.insert(image.clone()).then(|| ServiceImage {
                    service: name.clone(),
                    image: image.clone(),
                    pull_policy: service.pull_policy.clone(),
                })
            })
            .collect()
    }

    /// Files whose content contributes to the deployment fingerprint.
    ///
    /// Relative paths are resolved against `base_dir`. The `.env` file next
    /// to the manifest is always included last.
    #[must_use]
    pub fn watch_files(&self, base_dir: &Path) -> Vec<PathBuf> {
        let env_files = self
            .services
            .values()
            .flat_map(|service| service.env_file.iter());
        let resource_files = self
            .configs
            .values()
            .chain(self.secrets.values())
            .filter_map(|resource| resource.as_ref()?.file.as_deref());

        let mut files: Vec<PathBuf> = Vec::new();
        for path in env_files.chain(resource_files) {
            let resolved = base_dir.join(path);
            if !files.contains(&resolved) {
                files.push(resolved);
            }
        }

        let dotenv = base_dir.join(DOTENV_FILE);
        if !files.contains(&dotenv) {
            files.push(dotenv);
        }
        files
    }
}
