//! Deployment descriptor updates.
//!
//! The descriptor (an ECS task definition in Terraform) names the image as
//! `<registry-host>/<repository>:<tag>`. [`ImageRefPattern`] finds every such
//! reference anchored on the known repository, and only the tag after the colon
//! is replaced. Every other byte of the descriptor is preserved.

use crate::config::repo_relative;
use crate::core::JarflowError;
use crate::hosting::HostingApi;
use crate::image::ImageTag;
use crate::publisher::{PrPublisher, PublishOutcome, descriptor_change_request};
use anyhow::{Context, Result};
use regex::Regex;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Matches image references for one repository.
#[derive(Debug, Clone)]
pub struct ImageRefPattern {
    regex: Regex,
    repository: String,
}

/// One image reference found in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// `<registry-host>/<repository>` as written in the descriptor.
    pub image: String,
    pub tag: String,
    /// Byte range of the tag.
    pub tag_span: Range<usize>,
}

impl ImageRefPattern {
    /// Anchor on `registry/repository` when the registry is known, else on any
    /// host path ending in `repository`.
    pub fn new(registry: Option<&str>, repository: &str) -> Result<Self> {
        let prefix = match registry {
            Some(host) => format!(
                "{}/{}",
                regex::escape(host.trim_end_matches('/')),
                regex::escape(repository)
            ),
            None => format!(r"(?:[A-Za-z0-9.-]+(?::[0-9]+)?/)*{}", regex::escape(repository)),
        };
        let regex = Regex::new(&format!(r"(?P<prefix>{prefix}):(?P<tag>[A-Za-z0-9_][A-Za-z0-9_.-]*)"))
            .context("Invalid image reference pattern")?;
        Ok(Self {
            regex,
            repository: repository.to_string(),
        })
    }

    /// Every reference in `text`, in order.
    pub fn find_all(&self, text: &str) -> Vec<ImageRef> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| {
                let prefix = caps.name("prefix")?;
                let tag = caps.name("tag")?;
                let preceded_by_name_char = text[..prefix.start()]
                    .chars()
                    .next_back()
                    .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'));
                if preceded_by_name_char {
                    return None;
                }
                Some(ImageRef {
                    image: prefix.as_str().to_string(),
                    tag: tag.as_str().to_string(),
                    tag_span: tag.range(),
                })
            })
            .collect()
    }

    /// Tag of the first reference.
    pub fn current_tag(&self, text: &str) -> Option<String> {
        self.find_all(text).into_iter().next().map(|r| r.tag)
    }

    /// Replace the tag of every reference with `tag`. `None` if there is no reference.
    pub fn rewrite(&self, text: &str, tag: &ImageTag) -> Option<String> {
        let refs = self.find_all(text);
        if refs.is_empty() {
            return None;
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for r in &refs {
            out.push_str(&text[last..r.tag_span.start]);
            out.push_str(tag.as_str());
            last = r.tag_span.end;
        }
        out.push_str(&text[last..]);
        Some(out)
    }

    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }
}

/// What applying a tag to the descriptor would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorPlan {
    /// The descriptor already points at the tag.
    AlreadyCurrent {
        tag: ImageTag,
    },
    Rewrite {
        image: String,
        previous_tag: String,
        new_tag: ImageTag,
        content: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorOutcome {
    AlreadyCurrent {
        tag: ImageTag,
    },
    Published {
        previous_tag: String,
        outcome: PublishOutcome,
    },
}

pub struct DescriptorUpdater {
    pattern: ImageRefPattern,
    repo_root: PathBuf,
    descriptor_path: PathBuf,
    labels: Vec<String>,
}

impl DescriptorUpdater {
    pub fn new(
        pattern: ImageRefPattern,
        repo_root: impl Into<PathBuf>,
        descriptor_path: impl Into<PathBuf>,
        labels: Vec<String>,
    ) -> Self {
        Self {
            pattern,
            repo_root: repo_root.into(),
            descriptor_path: descriptor_path.into(),
            labels,
        }
    }

    fn descriptor_file(&self) -> PathBuf {
        self.repo_root.join(&self.descriptor_path)
    }

    /// Compute the rewritten descriptor for `tag` without side effects.
    pub fn plan(&self, tag: &ImageTag) -> Result<DescriptorPlan> {
        let file = self.descriptor_file();
        let text = std::fs::read_to_string(&file)
            .with_context(|| format!("Failed to read deployment descriptor {}", file.display()))?;
        plan_rewrite(&self.pattern, &text, tag, &file)
    }

    /// Open the descriptor change request for `tag`, unless it is already current.
    pub async fn update<H: HostingApi>(
        &self,
        tag: &ImageTag,
        publisher: &PrPublisher<'_, H>,
    ) -> Result<DescriptorOutcome> {
        match self.plan(tag)? {
            DescriptorPlan::AlreadyCurrent {
                tag,
            } => {
                info!("Image tag is already {}; no pull request needed", tag);
                Ok(DescriptorOutcome::AlreadyCurrent {
                    tag,
                })
            }
            DescriptorPlan::Rewrite {
                image,
                previous_tag,
                new_tag,
                content,
            } => {
                info!("Updating {} from {} to {}", image, previous_tag, new_tag);
                let spec = descriptor_change_request(
                    &image,
                    &previous_tag,
                    &new_tag,
                    &repo_relative(&self.descriptor_path),
                    content,
                    &self.labels,
                )?;
                let outcome = publisher.ensure_change_request(&spec).await?;
                Ok(DescriptorOutcome::Published {
                    previous_tag,
                    outcome,
                })
            }
        }
    }
}

/// Pure core of [`DescriptorUpdater::plan`].
pub fn plan_rewrite(
    pattern: &ImageRefPattern,
    text: &str,
    tag: &ImageTag,
    file: &Path,
) -> Result<DescriptorPlan> {
    let refs = pattern.find_all(text);
    let Some(first) = refs.first() else {
        return Err(JarflowError::DescriptorFieldNotFound {
            path: file.display().to_string(),
            repository: pattern.repository().to_string(),
        }
        .into());
    };
    if refs.iter().any(|r| r.tag != first.tag) {
        warn!(
            "Descriptor {} references {} with different tags; all will be set to {}",
            file.display(),
            pattern.repository(),
            tag
        );
    }

    if refs.iter().all(|r| r.tag == tag.as_str()) {
        return Ok(DescriptorPlan::AlreadyCurrent {
            tag: tag.clone(),
        });
    }

    let content = pattern.rewrite(text, tag).unwrap_or_else(|| text.to_string());
    Ok(DescriptorPlan::Rewrite {
        image: first.image.clone(),
        previous_tag: first.tag.clone(),
        new_tag: tag.clone(),
        content,
    })
}
