//! Command-line interface for jarflow.
//!
//! Each pipeline stage is a subcommand so CI jobs can run them independently;
//! `run` executes the whole pipeline in one process.
//!
//! # Available Commands
//!
//! - `detect` - classify the paths changed by a commit (manifest / recipe / neither)
//! - `scan` - diff manifests against the recipe and open the recipe pull request
//! - `patch-recipe` - write new fetch directives into the recipe in place
//! - `build` - build and push the image, then write the handoff file
//! - `update-descriptor` - point the deployment descriptor at the new image tag
//! - `run` - all of the above, with the descriptor stage waiting on the build
//! - `verify-token` - check the token can reach and write to the repository
//!
//! # Typical CI usage
//!
//! ```bash
//! # manifest push
//! jarflow detect --range "$BASE..$HEAD" --require manifest && jarflow scan
//!
//! # image job, then descriptor job
//! jarflow build
//! jarflow update-descriptor
//! ```
//!
//! Settings follow the precedence flag > environment > `jarflow.toml` > default;
//! see [`crate::config`].

mod build;
mod detect;
mod patch_recipe;
mod run;
mod scan;
mod update_descriptor;
mod verify_token;

#[cfg(test)]
mod tests;

use crate::config::{ConfigOverrides, EnvSource, HostingSettings, PipelineConfig};
use crate::constants::env;
use crate::hosting::GitHubClient;
use crate::publisher::map_api_error;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// How a successful command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    /// A `--require` gate was not satisfied; the caller should skip downstream work.
    GateClosed,
}

/// Automates the path from a JAR manifest to a deployed container image.
#[derive(Parser, Debug)]
#[command(
    name = "jarflow",
    about = "Turn JAR manifests into Dockerfile, image and task definition pull requests",
    version,
    long_about = "jarflow detects new JAR dependency manifests, opens a pull request adding their \
                  download steps to the Dockerfile, builds and pushes the image, and opens a \
                  second pull request pointing the deployment descriptor at the new tag."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug output (same as RUST_LOG=debug).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (default: ./jarflow.toml if present).
    #[arg(short, long, global = true, env = env::CONFIG_PATH)]
    config: Option<PathBuf>,

    /// Repository checkout that relative paths are resolved against.
    #[arg(long, global = true, value_name = "DIR")]
    repo_root: Option<PathBuf>,

    /// Dockerfile, relative to the repository root.
    #[arg(long, global = true, value_name = "PATH")]
    recipe: Option<PathBuf>,

    /// Directory of JAR manifests, relative to the repository root.
    #[arg(long, global = true, value_name = "DIR")]
    manifests_dir: Option<PathBuf>,

    /// Deployment descriptor, relative to the repository root.
    #[arg(long, global = true, value_name = "PATH")]
    descriptor: Option<PathBuf>,

    /// Branch pull requests target.
    #[arg(long, global = true)]
    base_branch: Option<String>,

    /// File carrying the image tag from `build` to `update-descriptor`.
    #[arg(long, global = true, value_name = "PATH")]
    handoff_file: Option<PathBuf>,

    /// Where `scan` writes its JSON diff report.
    #[arg(long, global = true, value_name = "PATH")]
    report_file: Option<PathBuf>,

    /// Image repository name in the registry.
    #[arg(long, global = true)]
    image_repository: Option<String>,

    /// Registry host, e.g. `<account>.dkr.ecr.<region>.amazonaws.com`.
    #[arg(long, global = true)]
    registry_host: Option<String>,

    /// Repository owner on GitHub.
    #[arg(long, global = true)]
    repo_owner: Option<String>,

    /// Repository name on GitHub.
    #[arg(long, global = true)]
    repo_name: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify the paths changed by a commit.
    Detect(detect::DetectCommand),

    /// Open a pull request adding fetch directives for new manifests.
    Scan(scan::ScanCommand),

    /// Add fetch directives for new manifests to the Dockerfile in place.
    PatchRecipe(patch_recipe::PatchRecipeCommand),

    /// Build and push the image, then write the handoff file.
    Build(build::BuildCommand),

    /// Open a pull request pointing the task definition at the new image tag.
    UpdateDescriptor(update_descriptor::UpdateDescriptorCommand),

    /// Run every stage: scan alongside build, then the descriptor update.
    Run(run::RunCommand),

    /// Check the GitHub token, repository access and push permission.
    VerifyToken(verify_token::VerifyTokenCommand),
}

/// Resolved configuration handed to every subcommand.
pub(crate) struct CommandContext {
    pub config: PipelineConfig,
    pub env: EnvSource,
}

impl CommandContext {
    /// Token and coordinates, failing with the precondition that is missing.
    pub fn hosting(&self) -> Result<HostingSettings> {
        Ok(self.config.hosting(&self.env)?)
    }

    pub fn github(&self, settings: &HostingSettings) -> Result<GitHubClient> {
        GitHubClient::new(settings)
            .map_err(|e| map_api_error(&settings.repo.full_name(), "create API client", e).into())
    }
}

impl Cli {
    /// Initialise logging, resolve configuration and run the subcommand.
    pub async fn execute(self) -> Result<CommandStatus> {
        self.init_logging();

        let overrides = self.overrides();
        let config = PipelineConfig::load(self.config.as_deref(), overrides).await?;
        let ctx = CommandContext {
            config,
            env: EnvSource::process(),
        };

        match self.command {
            Commands::Detect(cmd) => cmd.execute(&ctx).await,
            Commands::Scan(cmd) => cmd.execute(&ctx).await,
            Commands::PatchRecipe(cmd) => cmd.execute(&ctx).await,
            Commands::Build(cmd) => cmd.execute(&ctx).await,
            Commands::UpdateDescriptor(cmd) => cmd.execute(&ctx).await,
            Commands::Run(cmd) => cmd.execute(&ctx).await,
            Commands::VerifyToken(cmd) => cmd.execute(&ctx).await,
        }
    }

    /// Filter level implied by `--verbose` / `--quiet`.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }

    /// `RUST_LOG` wins over the flags when set.
    fn init_logging(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.log_level()));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            repo_root: self.repo_root.clone(),
            recipe: self.recipe.clone(),
            manifests_dir: self.manifests_dir.clone(),
            descriptor: self.descriptor.clone(),
            base_branch: self.base_branch.clone(),
            handoff_file: self.handoff_file.clone(),
            report_file: self.report_file.clone(),
            image_repository: self.image_repository.clone(),
            registry_host: self.registry_host.clone(),
            repo_owner: self.repo_owner.clone(),
            repo_name: self.repo_name.clone(),
        }
    }
}
