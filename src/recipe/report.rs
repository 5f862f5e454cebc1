//! JSON diff report written by every scan, for CI artifacts and debugging.

use super::diff::{DiffResult, UrlDrift};
use crate::manifest::SkippedManifest;
use crate::utils::safe_write;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct NewJarEntry {
    pub url: String,
    pub description: String,
    pub install_target: String,
}

/// Snapshot of one diff computation.
#[derive(Debug, Clone, Serialize)]
pub struct DiffReport {
    pub timestamp: DateTime<Utc>,
    pub existing_jars: Vec<String>,
    pub requested_jars: Vec<String>,
    pub new_jars: BTreeMap<String, NewJarEntry>,
    pub url_drift: Vec<UrlDrift>,
    pub skipped: Vec<SkippedManifest>,
    pub action_required: bool,
}

impl DiffReport {
    pub fn from_diff(diff: &DiffResult) -> Self {
        Self {
            timestamp: Utc::now(),
            existing_jars: diff.existing_names.iter().cloned().collect(),
            requested_jars: diff.requested_names.clone(),
            new_jars: diff
                .new_or_changed
                .iter()
                .map(|m| {
                    (
                        m.name.clone(),
                        NewJarEntry {
                            url: m.source_url.clone(),
                            description: m.description.clone(),
                            install_target: m.install_target(),
                        },
                    )
                })
                .collect(),
            url_drift: diff.url_drift.clone(),
            skipped: diff.skipped.clone(),
            action_required: !diff.is_empty(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize diff report")?;
        safe_write(path, &json)
            .with_context(|| format!("Failed to write diff report to {}", path.display()))?;
        tracing::info!("Diff report saved to {}", path.display());
        Ok(())
    }
}
