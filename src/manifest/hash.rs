//! Manifest fingerprinting for change detection.
//!
//! A fingerprint covers the interpolated manifest in canonical form, followed
//! by the content of every file the manifest depends on. Two loads of an
//! unchanged deployment always produce the same fingerprint.

use sha2::{Digest, Sha256};
use std::path::PathBuf;

use crate::error::{ManifestError, Result};

/// Hasher for computing deployment fingerprints.
#[derive(Debug, Default)]
pub struct ManifestHasher;

impl ManifestHasher {
    /// Creates a new manifest hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the fingerprint of a manifest document and its watch files.
    ///
    /// Missing watch files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized or an existing
    /// watch file cannot be read.
    pub fn fingerprint(&self, document: &serde_yaml::Value, watch_files: &[PathBuf]) -> Result<String> {
        let mut hasher = Sha256::new();

        let canonical = serde_yaml::to_string(&canonicalize(document)).map_err(|e| {
            ManifestError::ParseError {
                message: format!("Failed to serialize manifest: {e}"),
                location: None,
            }
        })?;
        hasher.update(canonical.as_bytes());

        for file in watch_files {
            match std::fs::read(file) {
                Ok(content) => {
                    hasher.update(file.to_string_lossy().as_bytes());
                    hasher.update(content);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(ManifestError::Read {
                        path: file.clone(),
                        message: e.to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// First 8 characters of a fingerprint, for log lines.
    #[must_use]
    pub fn short_hash(hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}

/// Returns a copy of the document with every mapping sorted by key.
#[must_use]
pub fn canonicalize(value: &serde_yaml::Value) -> serde_yaml::Value {
    use serde_yaml::Value;

    match value {
        Value::Mapping(mapping) => {
            let mut entries: Vec<(String, &Value, &Value)> = mapping
                .iter()
                .map(|(k, v)| (sort_key(k), k, v))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sorted = serde_yaml::Mapping::with_capacity(entries.len());
            for (_, k, v) in entries {
                sorted.insert(k.clone(), canonicalize(v));
            }
            Value::Mapping(sorted)
        }
        Value::Sequence(items) => Value::Sequence(items.iter().map(canonicalize).collect()),
        Value::Tagged(tagged) => Value::Tagged(Box::new(serde_yaml::value::TaggedValue {
            tag: tagged.tag.clone(),
            value: canonicalize(&tagged.value),
        })),
        other => other.clone(),
    }
}

fn sort_key(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other).unwrap_or_default(),
    }
}
