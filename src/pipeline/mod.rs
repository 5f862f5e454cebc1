//! Stage orchestration.
//!
//! Three stages make up a run:
//!
//! - **scan**: diff the manifests against the recipe, write the diff report, patch
//!   the recipe in memory and open the recipe change request
//! - **build**: build and push the image from the recipe as it is checked out
//! - **descriptor**: point the deployment descriptor at the new tag
//!
//! Each stage can run as its own CI job (see the CLI) or all together through
//! [`run`]. In a combined run the scan proceeds concurrently with the build, and the
//! descriptor stage starts only after the build has terminated, receiving the
//! [`Handoff`] message over a oneshot channel. A failed stage never aborts the others.

use crate::config::{PipelineConfig, repo_relative};
use crate::constants::FAILED_RECIPE_FILE_NAME;
use crate::core::JarflowError;
use crate::descriptor::{DescriptorOutcome, DescriptorUpdater, ImageRefPattern};
use crate::detect::{ChangeDetector, ChangeKind, ChangeSet, changed_paths};
use crate::handoff::Handoff;
use crate::hosting::HostingApi;
use crate::image::{BuildArtifact, BuildStage, ContainerTool, ImageTag, resolve_commit};
use crate::manifest::ManifestStore;
use crate::publisher::{PrPublisher, PublishOutcome, recipe_change_request};
use crate::recipe::{BuildRecipe, DiffReport, DiffResult, PatchOutcome, RecipePatcher, diff};
use crate::utils::safe_write;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Classify the paths changed by `range` (or by `HEAD`).
pub async fn detect_changes(config: &PipelineConfig, range: Option<&str>) -> Result<ChangeSet> {
    let detector = ChangeDetector::new(&config.manifests_dir, &config.recipe_path)?;
    let paths = changed_paths(&config.repo_root, range).await?;
    let changes = detector.classify(&paths);
    info!("Change classification: {}", changes);
    Ok(changes)
}

/// Diff, report and patch: everything the scan does before touching the hosting API.
#[derive(Debug, Clone)]
pub struct ScanPlan {
    pub diff: DiffResult,
    /// Present only when there is something to add.
    pub patch: Option<PatchOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Detection gate closed: no manifest changed in this commit.
    GateClosed(ChangeSet),
    /// Every manifest is already fetched by the recipe.
    NothingToAdd,
    Published {
        added: Vec<String>,
        outcome: PublishOutcome,
    },
}

fn read_recipe(config: &PipelineConfig) -> Result<BuildRecipe> {
    let path = config.recipe_file();
    if !path.exists() {
        return Err(JarflowError::RecipeNotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read recipe {}", path.display()))?;
    BuildRecipe::parse(text)
}

/// Diff the manifest store against the recipe and patch it in memory.
///
/// Always writes the diff report. The recipe file itself is not modified.
pub fn plan_scan(config: &PipelineConfig) -> Result<ScanPlan> {
    let recipe = read_recipe(config)?;
    let loaded = ManifestStore::new(config.manifests_path()).load()?;
    let diff = diff(&recipe, &loaded);

    if let Err(e) = DiffReport::from_diff(&diff).write(&config.report_path) {
        warn!("Could not write diff report: {:#}", e);
    }

    if diff.is_empty() {
        info!("No new JARs to add ({} already present)", diff.existing_names.len());
        return Ok(ScanPlan {
            diff,
            patch: None,
        });
    }

    info!("New JARs: {}", diff.new_names().join(", "));
    let patch = RecipePatcher::new()
        .with_marker(config.insertion_marker.as_str())
        .apply(&recipe, &diff.new_or_changed);
    Ok(ScanPlan {
        diff,
        patch: Some(patch),
    })
}

/// Where the patched recipe is saved when publishing fails.
#[must_use]
pub fn failed_recipe_path(config: &PipelineConfig) -> PathBuf {
    config
        .report_path
        .parent()
        .map_or_else(|| PathBuf::from(FAILED_RECIPE_FILE_NAME), |dir| dir.join(FAILED_RECIPE_FILE_NAME))
}

/// Open the recipe change request for `plan`.
///
/// On failure the patched recipe is saved next to the diff report before the
/// error is returned.
pub async fn publish_scan<H: HostingApi>(
    config: &PipelineConfig,
    plan: ScanPlan,
    publisher: &PrPublisher<'_, H>,
) -> Result<ScanOutcome> {
    let Some(patch) = plan.patch else {
        return Ok(ScanOutcome::NothingToAdd);
    };

    let published = async {
        let spec = recipe_change_request(
            &plan.diff.new_or_changed,
            &plan.diff.url_drift,
            &repo_relative(&config.recipe_path),
            patch.content.clone(),
            &config.recipe_labels,
        )?;
        let outcome = publisher.ensure_change_request(&spec).await?;
        Ok::<_, anyhow::Error>(outcome)
    }
    .await;

    match published {
        Ok(outcome) => {
            info!("Recipe change request {}", outcome);
            Ok(ScanOutcome::Published {
                added: patch.added,
                outcome,
            })
        }
        Err(e) => {
            save_failed_recipe(&failed_recipe_path(config), &patch.content);
            Err(e)
        }
    }
}

fn save_failed_recipe(path: &Path, content: &str) {
    match safe_write(path, content) {
        Ok(()) => warn!("Saved patched recipe to {} for inspection", path.display()),
        Err(e) => warn!("Could not save patched recipe: {:#}", e),
    }
}

/// The scan stage, optionally gated on a manifest change in `range`.
pub async fn scan_stage<H: HostingApi>(
    config: &PipelineConfig,
    publisher: &PrPublisher<'_, H>,
    gate: Option<Option<&str>>,
) -> Result<ScanOutcome> {
    if let Some(range) = gate {
        let changes = detect_changes(config, range).await?;
        if !changes.satisfies(ChangeKind::Manifest) {
            info!("No manifest changes; skipping scan");
            return Ok(ScanOutcome::GateClosed(changes));
        }
    }
    let plan = plan_scan(config)?;
    publish_scan(config, plan, publisher).await
}

/// The build stage: tag from the run's commit, build, push, write the handoff file.
pub async fn build_stage<C: ContainerTool>(
    config: &PipelineConfig,
    tool: &C,
    push: bool,
) -> Result<BuildArtifact> {
    Handoff::clear(&config.handoff_path)?;
    let commit = resolve_commit(config.commit.as_deref(), &config.repo_root).await?;
    let tag = ImageTag::from_commit(&commit)?;
    let stage = BuildStage::new(
        tool,
        config.recipe_file(),
        config.build_context(),
        config.image_name(),
        &config.handoff_path,
    );
    let stage = if push { stage } else { stage.without_push() };
    stage.run(tag).await
}

/// Descriptor updater configured from `config`.
pub fn descriptor_updater(config: &PipelineConfig) -> Result<DescriptorUpdater> {
    let pattern = ImageRefPattern::new(config.registry_host.as_deref(), &config.image_repository)?;
    Ok(DescriptorUpdater::new(
        pattern,
        &config.repo_root,
        &config.descriptor_path,
        config.descriptor_labels.clone(),
    ))
}

/// The descriptor stage for an already received handoff message.
pub async fn descriptor_stage<H: HostingApi>(
    config: &PipelineConfig,
    handoff: Handoff,
    publisher: &PrPublisher<'_, H>,
) -> Result<DescriptorOutcome> {
    let tag = handoff.require(&config.handoff_path)?;
    descriptor_updater(config)?.update(&tag, publisher).await
}

/// Results of every stage of a combined run.
#[derive(Debug)]
pub struct RunReport {
    pub scan: Result<ScanOutcome>,
    pub build: Result<BuildArtifact>,
    pub descriptor: Result<DescriptorOutcome>,
}

impl RunReport {
    /// Names of the stages that failed.
    #[must_use]
    pub fn failed_stages(&self) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if self.scan.is_err() {
            failed.push("scan");
        }
        if self.build.is_err() {
            failed.push("build");
        }
        if self.descriptor.is_err() {
            failed.push("descriptor");
        }
        failed
    }
}

/// Run every stage. `gate` is as for [`scan_stage`].
pub async fn run<H: HostingApi, C: ContainerTool>(
    config: &PipelineConfig,
    publisher: &PrPublisher<'_, H>,
    tool: &C,
    gate: Option<Option<&str>>,
) -> RunReport {
    let (tx, rx) = oneshot::channel::<Handoff>();

    let scan = async {
        let result = scan_stage(config, publisher, gate).await;
        if let Err(e) = &result {
            error!("Scan stage failed: {:#}", e);
        }
        result
    };

    let build = async {
        let result = build_stage(config, tool, true).await;
        let message = match &result {
            Ok(artifact) => Handoff::Present(artifact.tag.clone()),
            Err(e) => {
                error!("Build stage failed: {:#}", e);
                Handoff::Absent
            }
        };
        if tx.send(message).is_err() {
            warn!("Descriptor stage is no longer waiting for the image tag");
        }
        result
    };

    let descriptor = async {
        // Blocks until the build stage has terminated either way.
        let message = rx.await.unwrap_or(Handoff::Absent);
        if let Err(e) = Handoff::take(&config.handoff_path) {
            warn!("Could not consume handoff file: {:#}", e);
        }
        let result = descriptor_stage(config, message, publisher).await;
        if let Err(e) = &result {
            error!("Descriptor stage failed: {:#}", e);
        }
        result
    };

    let (scan, build, descriptor) = tokio::join!(scan, build, descriptor);
    RunReport {
        scan,
        build,
        descriptor,
    }
}
