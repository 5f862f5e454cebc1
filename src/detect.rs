//! Change detection: decide which pipeline paths a commit should trigger.
//!
//! The detector classifies the set of repository paths touched by a commit. A path is
//! manifest-related when it is a `*.json` file directly under the manifests directory,
//! and recipe-related when it is the recipe file (by basename) in the build context
//! directory. Both can hold for the same commit.
//!
//! Classification is pure; [`changed_paths`] is the git-backed helper that produces
//! the input.

use crate::constants::MANIFEST_EXTENSION;
use crate::core::JarflowError;
use crate::pattern::PatternMatcher;
use crate::process::ToolCommand;
use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// The kind of change a downstream stage is gated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Manifest,
    Recipe,
    /// Either of the above.
    Any,
}

impl FromStr for ChangeKind {
    type Err = JarflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manifest" | "manifests" => Ok(Self::Manifest),
            "recipe" | "dockerfile" => Ok(Self::Recipe),
            "any" => Ok(Self::Any),
            _ => Err(JarflowError::UnknownChangeKind {
                kind: s.to_string(),
            }),
        }
    }
}

/// Classification of one commit's changed paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub manifest_changed: bool,
    pub recipe_changed: bool,
    pub manifest_paths: Vec<String>,
    pub recipe_paths: Vec<String>,
}

impl ChangeSet {
    /// Whether the gate for `kind` is open.
    #[must_use]
    pub const fn satisfies(&self, kind: ChangeKind) -> bool {
        match kind {
            ChangeKind::Manifest => self.manifest_changed,
            ChangeKind::Recipe => self.recipe_changed,
            ChangeKind::Any => self.manifest_changed || self.recipe_changed,
        }
    }

    #[must_use]
    pub const fn is_neither(&self) -> bool {
        !self.manifest_changed && !self.recipe_changed
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.manifest_changed, self.recipe_changed) {
            (true, true) => write!(f, "manifestChanged, recipeChanged"),
            (true, false) => write!(f, "manifestChanged"),
            (false, true) => write!(f, "recipeChanged"),
            (false, false) => write!(f, "neither"),
        }
    }
}

/// Classifies paths against the configured manifests directory and recipe.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    manifest_matcher: PatternMatcher,
    recipe_matcher: PatternMatcher,
}

impl ChangeDetector {
    /// `recipe_path` is the repository-relative recipe; its parent is the build context.
    pub fn new(manifests_dir: &Path, recipe_path: &Path) -> Result<Self> {
        let recipe_name = recipe_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| JarflowError::ConfigError {
                message: format!("recipe path has no file name: {}", recipe_path.display()),
            })?;
        let context_dir =
            recipe_path.parent().map(|p| p.to_string_lossy().to_string()).unwrap_or_default();

        Ok(Self {
            manifest_matcher: PatternMatcher::under(
                &manifests_dir.to_string_lossy(),
                &format!("*.{MANIFEST_EXTENSION}"),
            )?,
            recipe_matcher: PatternMatcher::under(
                &context_dir,
                &glob::Pattern::escape(&recipe_name),
            )?,
        })
    }

    pub fn classify<I, P>(&self, paths: I) -> ChangeSet
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut changes = ChangeSet::default();
        for path in paths {
            let path = path.as_ref();
            if self.manifest_matcher.matches(path) {
                debug!("Manifest change: {}", path.display());
                changes.manifest_changed = true;
                changes.manifest_paths.push(path.display().to_string());
            }
            if self.recipe_matcher.matches(path) {
                debug!("Recipe change: {}", path.display());
                changes.recipe_changed = true;
                changes.recipe_paths.push(path.display().to_string());
            }
        }
        changes
    }
}

/// Paths touched by the commit range, or by `HEAD` against its parent.
///
/// When `range` is absent, invalid, or yields no paths (first commit, shallow
/// clone), the immediately preceding commit is used as the comparison base. For a
/// root commit, the files introduced by the commit itself are returned.
pub async fn changed_paths(repo_dir: &Path, range: Option<&str>) -> Result<Vec<String>> {
    if let Some(range) = range.filter(|r| !r.trim().is_empty()) {
        match git_diff_names(repo_dir, &[range]).await {
            Ok(paths) if !paths.is_empty() => return Ok(paths),
            Ok(_) => info!("Commit range {} touched no files, comparing with HEAD~1", range),
            Err(e) => info!("Commit range {} unusable ({}), comparing with HEAD~1", range, e),
        }
    }

    match git_diff_names(repo_dir, &["HEAD~1", "HEAD"]).await {
        Ok(paths) => Ok(paths),
        Err(e) => {
            debug!("No parent commit ({}); listing files of HEAD", e);
            let out = ToolCommand::git()
                .current_dir(repo_dir)
                .args(["show", "--name-only", "--pretty=format:", "HEAD"])
                .with_context("changed-paths")
                .execute_stdout()
                .await?;
            Ok(split_lines(&out))
        }
    }
}

async fn git_diff_names(repo_dir: &Path, revs: &[&str]) -> Result<Vec<String>> {
    let out = ToolCommand::git()
        .current_dir(repo_dir)
        .args(["diff", "--name-only"])
        .args(revs.iter().copied())
        .with_context("changed-paths")
        .execute_stdout()
        .await?;
    Ok(split_lines(&out))
}

fn split_lines(out: &str) -> Vec<String> {
    out.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect()
}
