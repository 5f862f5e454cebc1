//! Recipe patching: append fetch directives for new manifests.
//!
//! The patcher only ever inserts text at a single offset. Bytes before the offset
//! are untouched and bytes after it are shifted unchanged, so existing directives
//! are never modified or removed.
//!
//! Insertion point, in order of preference:
//! 1. Above the insertion marker comment (and the `# ===` rule line directly above it)
//! 2. Directly after the last existing fetch directive
//! 3. End of file

use super::BuildRecipe;
use crate::constants::INSERTION_MARKER;
use crate::manifest::DependencyManifest;
use tracing::debug;

/// Where new directives were placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Marker,
    AfterLastDirective,
    EndOfFile,
}

/// The patched recipe and where it changed.
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub content: String,
    /// Byte offset at which text was inserted; everything before it is unchanged.
    pub insertion_offset: usize,
    /// Length in bytes of the inserted text.
    pub inserted_len: usize,
    pub placement: Placement,
    /// Names of the dependencies added, in insertion order.
    pub added: Vec<String>,
}

impl PatchOutcome {
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.inserted_len == 0
    }
}

/// Render the fetch directive for one manifest.
#[must_use]
pub fn render_directive(manifest: &DependencyManifest) -> String {
    let target = manifest.install_target();
    let label = manifest.label().replace(['\r', '\n'], " ");
    format!(
        "# Download {label}\n\
         RUN curl -L \"{url}\" \\\n        -o {target} && \\\n        chown 1000:1000 {target}\n",
        url = manifest.source_url,
    )
}

/// Inserts fetch directives into a recipe.
#[derive(Debug, Clone)]
pub struct RecipePatcher {
    marker: String,
}

impl Default for RecipePatcher {
    fn default() -> Self {
        Self {
            marker: INSERTION_MARKER.to_string(),
        }
    }
}

impl RecipePatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    /// Append one directive per manifest, in the given order.
    pub fn apply(&self, recipe: &BuildRecipe, new: &[DependencyManifest]) -> PatchOutcome {
        let original = recipe.content();
        let (offset, placement) = self.insertion_point(recipe);

        if new.is_empty() {
            return PatchOutcome {
                content: original.to_string(),
                insertion_offset: offset,
                inserted_len: 0,
                placement,
                added: Vec::new(),
            };
        }

        let prefix = &original[..offset];
        let mut inserted = String::new();
        match placement {
            Placement::Marker => {
                if !prefix.is_empty() && !prefix.ends_with("\n\n") {
                    inserted.push('\n');
                }
                for manifest in new {
                    inserted.push_str(&render_directive(manifest));
                    inserted.push('\n');
                }
            }
            Placement::AfterLastDirective | Placement::EndOfFile => {
                if !prefix.is_empty() && !prefix.ends_with('\n') {
                    inserted.push('\n');
                }
                for manifest in new {
                    inserted.push('\n');
                    inserted.push_str(&render_directive(manifest));
                }
            }
        }

        debug!("Inserting {} directive(s) at byte {} ({:?})", new.len(), offset, placement);

        let mut content = String::with_capacity(original.len() + inserted.len());
        content.push_str(prefix);
        content.push_str(&inserted);
        content.push_str(&original[offset..]);

        PatchOutcome {
            content,
            insertion_offset: offset,
            inserted_len: inserted.len(),
            placement,
            added: new.iter().map(|m| m.name.clone()).collect(),
        }
    }

    fn insertion_point(&self, recipe: &BuildRecipe) -> (usize, Placement) {
        let text = recipe.content();

        if let Some(offset) = self.marker_offset(text) {
            return (offset, Placement::Marker);
        }
        if let Some(last) = recipe.directives().iter().map(|d| d.span.end).max() {
            return (last, Placement::AfterLastDirective);
        }
        (text.len(), Placement::EndOfFile)
    }

    /// Start of the marker line, or of the rule line directly above it.
    fn marker_offset(&self, text: &str) -> Option<usize> {
        let mut offset = 0;
        let mut previous: Option<(usize, &str)> = None;

        for line in text.split_inclusive('\n') {
            if line.trim() == self.marker {
                return Some(match previous {
                    Some((start, prev)) if is_rule_line(prev) => start,
                    _ => offset,
                });
            }
            previous = Some((offset, line));
            offset += line.len();
        }
        None
    }
}

fn is_rule_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("# =") && trimmed.chars().all(|c| matches!(c, '#' | '=' | ' '))
}
