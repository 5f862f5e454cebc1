//! Dependency manifests and the manifest store.
//!
//! A manifest is a small JSON document asking for one JAR to be baked into the
//! container image:
//!
//! ```json
//! {
//!   "name": "mysql-connector-j-9.5.0.jar",
//!   "url": "https://repo1.maven.org/maven2/com/mysql/mysql-connector-j/9.5.0/mysql-connector-j-9.5.0.jar",
//!   "install_path": "/opt/nifi/nifi-current/lib/",
//!   "description": "MySQL JDBC Driver",
//!   "requested_by": "data-platform",
//!   "reason": "New CDC source",
//!   "version": "9.5.0"
//! }
//! ```
//!
//! `name`, `url` and `install_path` are required. The manifest store is a flat
//! directory of such files; subdirectories are ignored.
//!
//! Loading never fails because of a single bad manifest: read, parse and
//! validation failures are collected as [`SkippedManifest`] entries and the remaining
//! manifests are returned.

use crate::constants::{ARTIFACT_EXTENSION, MANIFEST_EXTENSION};
use crate::core::JarflowError;
use crate::pattern::PatternMatcher;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// A request for one dependency to be installed into the build artifact.
///
/// Identity is `name`, which is also the installed file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyManifest {
    pub name: String,

    #[serde(rename = "url")]
    pub source_url: String,

    /// Directory to install into, or the full target path ending in `name`.
    pub install_path: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl DependencyManifest {
    /// Parse and validate manifest JSON read from `file`.
    pub fn from_json(file: &str, content: &str) -> Result<Self, JarflowError> {
        let manifest: Self =
            serde_json::from_str(content).map_err(|e| JarflowError::ManifestParseError {
                file: file.to_string(),
                reason: e.to_string(),
            })?;
        manifest.validate(file)?;
        Ok(manifest)
    }

    /// Check required fields and that `name` agrees with the install target.
    pub fn validate(&self, file: &str) -> Result<(), JarflowError> {
        let invalid = |reason: String| JarflowError::ManifestValidationError {
            file: file.to_string(),
            reason,
        };

        for (field, value) in
            [("name", &self.name), ("url", &self.source_url), ("install_path", &self.install_path)]
        {
            if value.trim().is_empty() {
                return Err(invalid(format!("required field '{field}' is empty")));
            }
        }

        if !self.name.chars().all(is_name_char) {
            return Err(invalid(format!(
                "name '{}' must be a bare file name of letters, digits and '._+-'",
                self.name
            )));
        }
        if !self.name.ends_with(ARTIFACT_EXTENSION) || self.name.len() == ARTIFACT_EXTENSION.len() {
            return Err(invalid(format!(
                "name '{}' must end with '{ARTIFACT_EXTENSION}'",
                self.name
            )));
        }
        if !(self.source_url.starts_with("https://") || self.source_url.starts_with("http://")) {
            return Err(invalid(format!("url '{}' must be an http(s) URL", self.source_url)));
        }
        if self.source_url.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\') {
            return Err(invalid(format!(
                "url '{}' must not contain whitespace, quotes or backslashes",
                self.source_url
            )));
        }
        if !self.install_path.chars().all(|c| is_name_char(c) || c == '/') {
            return Err(invalid(format!(
                "install_path '{}' may only contain letters, digits and '._+-/'",
                self.install_path
            )));
        }

        if self.install_path.ends_with(ARTIFACT_EXTENSION) {
            let target = file_name_of(&self.install_path);
            if target != self.name {
                return Err(JarflowError::InstallTargetMismatch {
                    file: file.to_string(),
                    name: self.name.clone(),
                    install_target: target.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Full path the JAR is downloaded to inside the image.
    #[must_use]
    pub fn install_target(&self) -> String {
        if self.install_path.ends_with(ARTIFACT_EXTENSION) {
            self.install_path.clone()
        } else {
            format!("{}/{}", self.install_path.trim_end_matches('/'), self.name)
        }
    }

    /// Human-readable label: the description, or the name when there is none.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.description.trim().is_empty() { &self.name } else { self.description.trim() }
    }
}

/// Characters a fetch directive carries unquoted in its output path.
fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-')
}

/// Last path component of a slash-separated path.
pub(crate) fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// A manifest file that could not be used, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedManifest {
    pub file: String,
    pub reason: String,
}

/// The outcome of reading the manifest store.
#[derive(Debug, Clone, Default)]
pub struct LoadedManifests {
    /// Valid manifests sorted by name, unique by name.
    pub manifests: Vec<DependencyManifest>,
    pub skipped: Vec<SkippedManifest>,
}

/// A flat directory of `*.json` manifests.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
        }
    }

    /// Read every manifest. A missing directory is an empty store.
    ///
    /// Files are visited in path order, so when two files claim the same name the
    /// first one wins and the other is skipped.
    pub fn load(&self) -> Result<LoadedManifests> {
        let mut loaded = LoadedManifests::default();

        if !self.dir.is_dir() {
            warn!("Manifests directory not found: {}", self.dir.display());
            return Ok(loaded);
        }

        let matcher = PatternMatcher::new(&format!("*.{MANIFEST_EXTENSION}"))?;
        let files = matcher.find_matches(&self.dir, 1)?;

        let mut by_name: BTreeMap<String, (String, DependencyManifest)> = BTreeMap::new();
        for path in files {
            let file = path.display().to_string();
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping unreadable manifest {}: {}", file, e);
                    loaded.skipped.push(SkippedManifest {
                        file,
                        reason: format!("unreadable: {e}"),
                    });
                    continue;
                }
            };

            match DependencyManifest::from_json(&file, &content) {
                Ok(manifest) => {
                    if let Some((first_file, _)) = by_name.get(&manifest.name) {
                        let reason = format!(
                            "duplicate name '{}' (already declared in {first_file})",
                            manifest.name
                        );
                        warn!("Skipping manifest {}: {}", file, reason);
                        loaded.skipped.push(SkippedManifest {
                            file,
                            reason,
                        });
                    } else {
                        debug!("Loaded manifest {} from {}", manifest.name, file);
                        by_name.insert(manifest.name.clone(), (file, manifest));
                    }
                }
                Err(e) => {
                    warn!("Skipping manifest: {}", e);
                    loaded.skipped.push(SkippedManifest {
                        file,
                        reason: e.to_string(),
                    });
                }
            }
        }

        loaded.manifests = by_name.into_values().map(|(_, m)| m).collect();
        Ok(loaded)
    }
}
