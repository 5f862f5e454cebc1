//! Dependency diff: which manifests are not yet fetched by the recipe.

use super::BuildRecipe;
use crate::manifest::{DependencyManifest, LoadedManifests, SkippedManifest};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// A manifest whose name is already fetched, but from a different URL.
///
/// Drift is reported, never patched: directives are append-only and unique per name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlDrift {
    pub name: String,
    pub recipe_url: String,
    pub manifest_url: String,
}

/// Result of comparing the recipe against the manifest store.
///
/// Recomputed on every run; never persisted.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    /// Manifests with no fetch directive, sorted by name.
    pub new_or_changed: Vec<DependencyManifest>,
    /// Names already fetched by the recipe.
    pub existing_names: BTreeSet<String>,
    /// Names of every valid manifest in the store, sorted.
    pub requested_names: Vec<String>,
    pub url_drift: Vec<UrlDrift>,
    pub skipped: Vec<SkippedManifest>,
}

impl DiffResult {
    /// Nothing to add. Not an error: the PR step simply does not run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_or_changed.is_empty()
    }

    pub fn new_names(&self) -> Vec<&str> {
        self.new_or_changed.iter().map(|m| m.name.as_str()).collect()
    }
}

/// Compute the manifests that still need a fetch directive.
pub fn diff(recipe: &BuildRecipe, loaded: &LoadedManifests) -> DiffResult {
    let existing_names = recipe.existing_names();
    let mut result = DiffResult {
        existing_names,
        skipped: loaded.skipped.clone(),
        ..DiffResult::default()
    };

    for manifest in &loaded.manifests {
        result.requested_names.push(manifest.name.clone());

        match recipe.find(&manifest.name) {
            None => {
                debug!("New dependency: {}", manifest.name);
                result.new_or_changed.push(manifest.clone());
            }
            Some(directive) if directive.url != manifest.source_url => {
                warn!(
                    "{} is already in the recipe with a different URL ({} vs {}); not changing it",
                    manifest.name, directive.url, manifest.source_url
                );
                result.url_drift.push(UrlDrift {
                    name: manifest.name.clone(),
                    recipe_url: directive.url.clone(),
                    manifest_url: manifest.source_url.clone(),
                });
            }
            Some(_) => debug!("Already present: {}", manifest.name),
        }
    }

    result.new_or_changed.sort_by(|a, b| a.name.cmp(&b.name));
    result.requested_names.sort();
    result
}
