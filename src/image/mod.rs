//! Build & publish stage: build the container image, push it, hand the tag off.
//!
//! The stage always builds whatever recipe is currently checked out. On success
//! it writes the tag to the handoff file; on any build or push failure the
//! handoff file is left absent so the descriptor stage fails fast.

use crate::constants::{DOCKER_PUSH_TIMEOUT, IMAGE_TAG_WIDTH, LATEST_TAG};
use crate::core::JarflowError;
use crate::handoff::Handoff;
use crate::process::ToolCommand;
use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Registry tag: the first seven lowercase hex characters of a commit id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageTag(String);

impl ImageTag {
    /// Derive the tag from a full (or abbreviated) commit id.
    pub fn from_commit(commit: &str) -> Result<Self, JarflowError> {
        let commit = commit.trim();
        if commit.len() < IMAGE_TAG_WIDTH || !commit.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(JarflowError::InvalidCommitId {
                commit: commit.to_string(),
            });
        }
        Ok(Self(commit[..IMAGE_TAG_WIDTH].to_ascii_lowercase()))
    }

    /// Validate an explicit tag, such as the content of the handoff file.
    pub fn parse(tag: &str) -> Result<Self, JarflowError> {
        let tag = tag.trim();
        let reason = if tag.len() != IMAGE_TAG_WIDTH {
            Some(format!("expected {IMAGE_TAG_WIDTH} characters, found {}", tag.len()))
        } else if !tag.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
            Some("expected lowercase hexadecimal".to_string())
        } else {
            None
        };
        match reason {
            Some(reason) => Err(JarflowError::InvalidImageTag {
                tag: tag.to_string(),
                reason,
            }),
            None => Ok(Self(tag.to_string())),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The container tooling the build stage drives.
#[allow(async_fn_in_trait)]
pub trait ContainerTool {
    /// Build `recipe` in `context`, applying every reference in `tags`.
    async fn build(&self, recipe: &Path, context: &Path, tags: &[String]) -> Result<()>;

    async fn push(&self, reference: &str) -> Result<()>;
}

/// `docker` on PATH.
#[derive(Debug, Clone, Default)]
pub struct DockerCli;

impl ContainerTool for DockerCli {
    async fn build(&self, recipe: &Path, context: &Path, tags: &[String]) -> Result<()> {
        let mut cmd = ToolCommand::docker()
            .arg("build")
            .arg("-f")
            .arg(recipe.display().to_string());
        for tag in tags {
            cmd = cmd.arg("-t").arg(tag.as_str());
        }
        cmd.arg(context.display().to_string())
            .inherit_stdio()
            .with_context("image build")
            .execute_success()
            .await
    }

    async fn push(&self, reference: &str) -> Result<()> {
        ToolCommand::docker()
            .with_timeout(Some(DOCKER_PUSH_TIMEOUT))
            .args(["push", reference])
            .inherit_stdio()
            .with_context("image push")
            .execute_success()
            .await
    }
}

/// A successfully built (and possibly pushed) image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub tag: ImageTag,
    /// Image name without tag, `<registry-host>/<repository>`.
    pub image: String,
    pub pushed: bool,
}

impl BuildArtifact {
    #[must_use]
    pub fn reference(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }
}

/// Build, tag, push, then write the handoff file.
pub struct BuildStage<'a, C: ContainerTool> {
    tool: &'a C,
    recipe: PathBuf,
    context: PathBuf,
    image: String,
    handoff_path: PathBuf,
    push: bool,
}

impl<'a, C: ContainerTool> BuildStage<'a, C> {
    pub fn new(
        tool: &'a C,
        recipe: impl Into<PathBuf>,
        context: impl Into<PathBuf>,
        image: impl Into<String>,
        handoff_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tool,
            recipe: recipe.into(),
            context: context.into(),
            image: image.into(),
            handoff_path: handoff_path.into(),
            push: true,
        }
    }

    /// Build only; no push, no handoff.
    #[must_use]
    pub fn without_push(mut self) -> Self {
        self.push = false;
        self
    }

    pub async fn run(&self, tag: ImageTag) -> Result<BuildArtifact> {
        // A failed build must leave no tag behind, including one from an earlier run.
        Handoff::clear(&self.handoff_path)?;

        if !self.recipe.exists() {
            return Err(JarflowError::RecipeNotFound {
                path: self.recipe.display().to_string(),
            }
            .into());
        }

        let tagged = format!("{}:{}", self.image, tag);
        let latest = format!("{}:{}", self.image, LATEST_TAG);
        info!("Building {} from {}", tagged, self.recipe.display());

        self.tool
            .build(&self.recipe, &self.context, &[tagged.clone(), latest.clone()])
            .await
            .with_context(|| format!("Failed to build {tagged}"))?;

        let artifact = BuildArtifact {
            tag,
            image: self.image.clone(),
            pushed: self.push,
        };

        if !self.push {
            warn!("Push disabled; handoff file {} not written", self.handoff_path.display());
            return Ok(artifact);
        }

        for reference in [&tagged, &latest] {
            info!("Pushing {}", reference);
            self.tool
                .push(reference)
                .await
                .with_context(|| format!("Failed to push {reference}"))?;
        }

        Handoff::write(&self.handoff_path, &artifact.tag)?;
        info!("Image tag {} written to {}", artifact.tag, self.handoff_path.display());
        Ok(artifact)
    }
}

/// Commit id of the run: the orchestrator-supplied one, else `git rev-parse HEAD`.
pub async fn resolve_commit(configured: Option<&str>, repo_root: &Path) -> Result<String> {
    if let Some(commit) = configured {
        return Ok(commit.to_string());
    }
    let output = ToolCommand::git()
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_root)
        .with_context("resolve commit")
        .execute_stdout()
        .await?;
    Ok(output.trim().to_string())
}
