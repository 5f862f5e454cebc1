//! The build recipe (Dockerfile) and the fetch directives inside it.
//!
//! A fetch directive is a `RUN` instruction that downloads one JAR with curl:
//!
//! ```dockerfile
//! # Download MySQL JDBC Driver
//! RUN curl -L "https://repo1.maven.org/.../mysql-connector-j-9.5.0.jar" \
//!         -o /opt/nifi/nifi-current/lib/mysql-connector-j-9.5.0.jar && \
//!         chown 1000:1000 /opt/nifi/nifi-current/lib/mysql-connector-j-9.5.0.jar
//! ```
//!
//! Recognition works on logical instructions (continuation lines joined), so line
//! breaks, indentation and extra curl flags do not matter, and a match never spans
//! two instructions. Everything else in the recipe is opaque text that the patcher
//! preserves byte for byte.
//!
//! # Modules
//!
//! - [`diff`] - compare directives against the manifest store
//! - [`patch`] - append directives for new manifests
//! - [`report`] - JSON diff report written by every scan

pub mod diff;
pub mod patch;
pub mod report;

pub use diff::{DiffResult, UrlDrift, diff};
pub use patch::{PatchOutcome, RecipePatcher, render_directive};
pub use report::DiffReport;

use crate::manifest::file_name_of;
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::ops::Range;
use tracing::warn;

/// One download-and-install block found in the recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchDirective {
    /// Installed file name (basename of the output path).
    pub name: String,
    pub url: String,
    /// Output path passed to `-o`.
    pub install_target: String,
    /// Byte range of the whole `RUN` instruction, including its trailing newline.
    pub span: Range<usize>,
}

/// A parsed build recipe: the original text plus the directives found in it.
#[derive(Debug, Clone)]
pub struct BuildRecipe {
    content: String,
    directives: Vec<FetchDirective>,
}

impl BuildRecipe {
    /// Parse recipe text. Unrecognized content is kept as-is.
    pub fn parse(content: impl Into<String>) -> Result<Self> {
        let content = content.into();
        let parser = DirectiveParser::new()?;
        let directives = parser.parse(&content);

        let mut seen = BTreeSet::new();
        for directive in &directives {
            if !seen.insert(directive.name.as_str()) {
                warn!("Recipe contains more than one fetch directive for {}", directive.name);
            }
        }

        Ok(Self {
            content,
            directives,
        })
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn directives(&self) -> &[FetchDirective] {
        &self.directives
    }

    /// Names of every dependency the recipe already fetches.
    pub fn existing_names(&self) -> BTreeSet<String> {
        self.directives.iter().map(|d| d.name.clone()).collect()
    }

    /// The first directive installing `name`.
    pub fn find(&self, name: &str) -> Option<&FetchDirective> {
        self.directives.iter().find(|d| d.name == name)
    }
}

/// Byte ranges of logical instructions: a line plus any `\`-continued lines after it.
pub(crate) fn logical_instructions(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        let begin = *start.get_or_insert(line_start);
        if line.trim_end().ends_with('\\') {
            continue;
        }
        spans.push(begin..offset);
        start = None;
    }
    if let Some(begin) = start {
        spans.push(begin..text.len());
    }
    spans
}

struct DirectiveParser {
    run: Regex,
    url: Regex,
    output: Regex,
}

impl DirectiveParser {
    fn new() -> Result<Self> {
        Ok(Self {
            run: Regex::new(r"(?i)^\s*RUN\s").context("Invalid RUN pattern")?,
            url: Regex::new(r#""(?P<url>https?://[^"\s]+)""#).context("Invalid URL pattern")?,
            output: Regex::new(r#"(?:^|\s)(?:-o|--output)\s+"?(?P<path>[^\s"\\&;]+)"?"#)
                .context("Invalid output pattern")?,
        })
    }

    fn parse(&self, text: &str) -> Vec<FetchDirective> {
        let mut directives = Vec::new();

        for span in logical_instructions(text) {
            let instruction = &text[span.clone()];
            if !self.run.is_match(instruction) {
                continue;
            }
            let joined = instruction.replace("\\\r\n", " ").replace("\\\n", " ");

            // Each curl invocation in the instruction is examined on its own
            for segment in joined.split("curl ").skip(1) {
                let Some(url) = self.url.captures(segment).and_then(|c| c.name("url")) else {
                    continue;
                };
                let Some(path) = self.output.captures(segment).and_then(|c| c.name("path")) else {
                    continue;
                };
                let install_target = path.as_str().to_string();
                directives.push(FetchDirective {
                    name: file_name_of(&install_target).to_string(),
                    url: url.as_str().to_string(),
                    install_target,
                    span: span.clone(),
                });
            }
        }

        directives
    }
}
