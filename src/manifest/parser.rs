//! Manifest loading with variable interpolation.
//!
//! A manifest is read from disk, every string value is interpolated against
//! the process environment overlaid on the `.env` file next to the manifest,
//! and the result is deserialized into a [`ComposeManifest`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ManifestError, Result};

use super::spec::{ComposeManifest, DOTENV_FILE};

/// A manifest after interpolation.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    /// Path of the manifest file.
    pub path: PathBuf,
    /// Directory the manifest lives in.
    pub base_dir: PathBuf,
    /// The interpolated document, as hashed.
    pub document: serde_yaml::Value,
    /// The typed view of the document.
    pub manifest: ComposeManifest,
}

/// Parser for compose manifests.
#[derive(Debug, Default)]
pub struct ManifestParser {
    /// Fixed environment, replaces the process environment when set.
    environment: Option<HashMap<String, String>>,
}

impl ManifestParser {
    /// Creates a parser that interpolates from the process environment.
    #[must_use]
    pub const fn new() -> Self {
        Self { environment: None }
    }

    /// Uses a fixed environment instead of the process environment.
    #[must_use]
    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Loads and interpolates a manifest file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the `.env` file is
    /// malformed, interpolation fails, or the manifest is not a valid compose
    /// document with at least one service.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<LoadedManifest> {
        let path = path.as_ref();
        debug!(file = %path.display(), "Loading manifest");

        if !path.exists() {
            return Err(ManifestError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let base_dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let variables = self.variables(&base_dir)?;

        let (document, manifest) = Self::parse_yaml(&content, &variables, Some(path))?;

        Ok(LoadedManifest {
            path: path.to_path_buf(),
            base_dir,
            document,
            manifest,
        })
    }

    /// Parses manifest text with the given variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid, interpolation fails, or no
    /// services are declared.
    pub fn parse_yaml(
        content: &str,
        variables: &HashMap<String, String>,
        source: Option<&Path>,
    ) -> Result<(serde_yaml::Value, ComposeManifest)> {
        let location = source.map(|p| p.display().to_string());

        let raw: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| ManifestError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: location.clone(),
            })?;

        let document = interpolate_value(raw, &|name| variables.get(name).cloned())?;

        let manifest: ComposeManifest =
            serde_yaml::from_value(document.clone()).map_err(|e| ManifestError::ParseError {
                message: format!("Invalid compose layout: {e}"),
                location,
            })?;

        if manifest.services.is_empty() {
            return Err(ManifestError::NoServices {
                path: source.map(Path::to_path_buf).unwrap_or_default(),
            }
            .into());
        }

        Ok((document, manifest))
    }

    /// Builds the interpolation variables for a manifest directory.
    fn variables(&self, base_dir: &Path) -> Result<HashMap<String, String>> {
        let mut variables = HashMap::new();

        let dotenv = base_dir.join(DOTENV_FILE);
        if dotenv.exists() {
            let entries = dotenvy::from_path_iter(&dotenv).map_err(|e| ManifestError::Read {
                path: dotenv.clone(),
                message: e.to_string(),
            })?;
            for entry in entries {
                let (key, value) = entry.map_err(|e| ManifestError::ParseError {
                    message: format!("Invalid .env entry: {e}"),
                    location: Some(dotenv.display().to_string()),
                })?;
                variables.insert(key, value);
            }
        }

        match &self.environment {
            Some(environment) => variables.extend(environment.clone()),
            None => variables.extend(std::env::vars()),
        }

        Ok(variables)
    }
}

/// Interpolates every string scalar of a YAML document. Keys are left as-is.
fn interpolate_value(
    value: serde_yaml::Value,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<serde_yaml::Value> {
    use serde_yaml::Value;

    Ok(match value {
        Value::String(s) => Value::String(interpolate(&s, lookup)?),
        Value::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(|item| interpolate_value(item, lookup))
                .collect::<Result<_>>()?,
        ),
        Value::Mapping(mapping) => {
            let mut out = serde_yaml::Mapping::with_capacity(mapping.len());
            for (k, v) in mapping {
                out.insert(k, interpolate_value(v, lookup)?);
            }
            Value::Mapping(out)
        }
        Value::Tagged(tagged) => {
            let serde_yaml::value::TaggedValue { tag, value } = *tagged;
            Value::Tagged(Box::new(serde_yaml::value::TaggedValue {
                tag,
                value: interpolate_value(value, lookup)?,
            }))
        }
        other => other,
    })
}

/// Substitutes `$VAR`, `${VAR}` and the compose default/required/alternate
/// forms. `$$` yields a literal `$`.
///
/// # Errors
///
/// Returns an error on an unterminated `${`, an invalid variable name, or a
/// required variable (`${VAR?msg}` / `${VAR:?msg}`) that is unset.
pub fn interpolate(input: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        match chars.peek().map(|&(_, next)| next) {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('{') => {
                chars.next();
                let start = i + 2;
                let mut depth = 1usize;
                let mut end = None;
                for (j, ch) in chars.by_ref() {
                    match ch {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                end = Some(j);
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                let end = end.ok_or_else(|| ManifestError::Interpolation {
                    variable: input[start..].to_string(),
                    message: String::from("missing closing brace"),
                })?;
                out.push_str(&expand(&input[start..end], lookup)?);
            }
            Some(next) if next == '_' || next.is_ascii_alphabetic() => {
                let mut name = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch == '_' || ch.is_ascii_alphanumeric() {
                        name.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&lookup(&name).unwrap_or_default());
            }
            _ => out.push('$'),
        }
    }

    Ok(out)
}

/// Expands the body of a `${...}` expression.
fn expand(expr: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Result<String> {
    let name_len = expr
        .find(|c: char| !(c == '_' || c.is_ascii_alphanumeric()))
        .unwrap_or(expr.len());
    let (name, rest) = expr.split_at(name_len);

    if name.is_empty() {
        return Err(ManifestError::Interpolation {
            variable: expr.to_string(),
            message: String::from("invalid variable name"),
        }
        .into());
    }

    let value = lookup(name);
    let is_set = value.is_some();
    let is_non_empty = value.as_deref().is_some_and(|v| !v.is_empty());

    let (operator, argument) = if rest.is_empty() {
        ("", "")
    } else if let Some((operator, argument)) = [":-", ":?", ":+", "-", "?", "+"]
        .iter()
        .find_map(|op| rest.strip_prefix(*op).map(|arg| (*op, arg)))
    {
        (operator, argument)
    } else {
        return Err(ManifestError::Interpolation {
            variable: expr.to_string(),
            message: format!("unsupported operator in '{rest}'"),
        }
        .into());
    };

    match operator {
        "" => Ok(value.unwrap_or_default()),
        ":-" if is_non_empty => Ok(value.unwrap_or_default()),
        "-" if is_set => Ok(value.unwrap_or_default()),
        ":-" | "-" => interpolate(argument, lookup),
        ":?" if is_non_empty => Ok(value.unwrap_or_default()),
        "?" if is_set => Ok(value.unwrap_or_default()),
        ":?" | "?" => Err(ManifestError::Interpolation {
            variable: name.to_string(),
            message: if argument.is_empty() {
                String::from("required variable is missing a value")
            } else {
                argument.to_string()
            },
        }
        .into()),
        ":+" if is_non_empty => interpolate(argument, lookup),
        "+" if is_set => interpolate(argument, lookup),
        _ => Ok(String::new()),
    }
}
