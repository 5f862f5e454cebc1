//! Glob pattern matching for repository paths.
//!
//! Used by the change detector to classify paths touched by a commit and by the
//! manifest store to discover manifest files.
//!
//! # Pattern Syntax
//!
//! - `*` matches any sequence of characters within a single path component
//! - `**` matches any sequence of path components
//! - `?` matches any single character
//! - `[abc]` / `[a-z]` match a character set or range
//!
//! Path separators are always literal, so `jars/*.json` does not match
//! `jars/archive/old.json`.

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: Pattern,
    original_pattern: String,
}

impl PatternMatcher {
    pub fn new(pattern_str: &str) -> Result<Self> {
        let pattern = Pattern::new(pattern_str)
            .with_context(|| format!("Invalid glob pattern: {pattern_str}"))?;

        Ok(Self {
            pattern,
            original_pattern: pattern_str.to_string(),
        })
    }

    /// Build a pattern from a directory and a file glob, escaping the directory part.
    ///
    /// `under("custom_nifi/jars", "*.json")` yields `custom_nifi/jars/*.json`.
    pub fn under(dir: &str, file_glob: &str) -> Result<Self> {
        let dir = normalize(dir);
        if dir.is_empty() {
            Self::new(file_glob)
        } else {
            Self::new(&format!("{}/{file_glob}", Pattern::escape(&dir)))
        }
    }

    /// Whether a repository-relative path matches.
    ///
    /// Backslashes and a leading `./` are normalized first so diff output and
    /// configured paths compare equal.
    pub fn matches(&self, path: &Path) -> bool {
        let normalized = normalize(&path.to_string_lossy());
        self.pattern.matches_with(&normalized, MATCH_OPTIONS)
    }

    /// Find regular files under `base_path` (at most `max_depth` levels deep)
    /// whose path relative to `base_path` matches, sorted.
    pub fn find_matches(&self, base_path: &Path, max_depth: usize) -> Result<Vec<PathBuf>> {
        debug!("Searching for pattern '{}' in {}", self.original_pattern, base_path.display());

        let mut matches = Vec::new();
        for entry in WalkDir::new(base_path)
            .follow_links(false)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if let Ok(relative_path) = path.strip_prefix(base_path) {
                trace!("Checking path: {}", relative_path.display());
                if self.matches(relative_path) {
                    matches.push(path.to_path_buf());
                }
            }
        }

        debug!("Found {} matches for pattern '{}'", matches.len(), self.original_pattern);
        Ok(matches)
    }
}

fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let trimmed = unified.trim_start_matches("./").trim_end_matches('/');
    trimmed.to_string()
}
