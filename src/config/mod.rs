//! Pipeline configuration.
//!
//! Settings come from four layers, highest precedence first:
//!
//! 1. Command-line flags ([`ConfigOverrides`])
//! 2. Environment variables (CI-provided, see [`crate::constants::env`])
//! 3. The project file `jarflow.toml` ([`ConfigFile`])
//! 4. Built-in defaults ([`crate::constants`])
//!
//! ```toml
//! # jarflow.toml
//! recipe = "custom_nifi/Dockerfile"
//! manifests_dir = "custom_nifi/jars"
//! descriptor = "ecs_task_definition.tf"
//! base_branch = "main"
//! image_repository = "apache-nifi-with-custom-jars-repo"
//! registry_host = "123456789012.dkr.ecr.ap-northeast-1.amazonaws.com"
//! recipe_labels = ["automated", "jar-update"]
//! ```
//!
//! Environment access goes through [`EnvSource`] so resolution can be tested
//! without touching process state.
//!
//! Hosting credentials are resolved separately by [`PipelineConfig::hosting`],
//! only for commands that talk to the hosting API.

use crate::constants::{self, env};
use crate::core::JarflowError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Where environment variables are read from.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    fixed: Option<HashMap<String, String>>,
}

impl EnvSource {
    /// Read from the process environment.
    #[must_use]
    pub fn process() -> Self {
        Self::default()
    }

    /// A fixed set of variables, for tests and embedding.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fixed: Some(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    /// Value of `key`; empty values count as unset.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match &self.fixed {
            Some(vars) => vars.get(key).cloned(),
            None => std::env::var(key).ok(),
        };
        value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }
}

/// Contents of `jarflow.toml`. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub recipe: Option<PathBuf>,
    pub manifests_dir: Option<PathBuf>,
    pub descriptor: Option<PathBuf>,
    pub base_branch: Option<String>,
    pub handoff_file: Option<PathBuf>,
    pub report_file: Option<PathBuf>,
    pub image_repository: Option<String>,
    pub registry_host: Option<String>,
    pub api_url: Option<String>,
    pub insertion_marker: Option<String>,
    pub recipe_labels: Option<Vec<String>>,
    pub descriptor_labels: Option<Vec<String>>,
}

impl ConfigFile {
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .map_err(JarflowError::from)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load `explicit` (which must exist), else `jarflow.toml` in `repo_root` if present.
    pub async fn discover(explicit: Option<&Path>, repo_root: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(JarflowError::ConfigError {
                    message: format!("config file not found: {}", path.display()),
                }
                .into());
            }
            return Self::load_from(path).await;
        }

        let default_path = repo_root.join(constants::CONFIG_FILE_NAME);
        if default_path.exists() {
            debug!("Using config file {}", default_path.display());
            Self::load_from(&default_path).await
        } else {
            Ok(Self::default())
        }
    }
}

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub repo_root: Option<PathBuf>,
    pub recipe: Option<PathBuf>,
    pub manifests_dir: Option<PathBuf>,
    pub descriptor: Option<PathBuf>,
    pub base_branch: Option<String>,
    pub handoff_file: Option<PathBuf>,
    pub report_file: Option<PathBuf>,
    pub image_repository: Option<String>,
    pub registry_host: Option<String>,
    pub repo_owner: Option<String>,
    pub repo_name: Option<String>,
}

/// Fully resolved settings shared by every stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Repository checkout that relative paths are resolved against.
    pub repo_root: PathBuf,
    /// Recipe path relative to the repository root.
    pub recipe_path: PathBuf,
    pub manifests_dir: PathBuf,
    pub descriptor_path: PathBuf,
    pub base_branch: String,
    pub handoff_path: PathBuf,
    pub report_path: PathBuf,
    pub image_repository: String,
    pub registry_host: Option<String>,
    pub api_url: String,
    pub insertion_marker: String,
    pub recipe_labels: Vec<String>,
    pub descriptor_labels: Vec<String>,
    /// Triggering commit as supplied by the orchestrator, if any.
    pub commit: Option<String>,
    repo_owner: Option<String>,
    repo_name: Option<String>,
}

/// Repository owner and name on the hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinates {
    pub owner: String,
    pub name: String,
}

impl RepoCoordinates {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Everything needed to open an authenticated hosting API handle.
#[derive(Clone)]
pub struct HostingSettings {
    pub token: String,
    pub repo: RepoCoordinates,
    pub api_url: String,
}

impl std::fmt::Debug for HostingSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostingSettings")
            .field("token", &"<redacted>")
            .field("repo", &self.repo)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl PipelineConfig {
    /// Load the config file and resolve all layers against the process environment.
    pub async fn load(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let repo_root = overrides.repo_root.clone().unwrap_or_else(|| PathBuf::from("."));
        let file = ConfigFile::discover(config_path, &repo_root).await?;
        Ok(Self::resolve(overrides, file, &EnvSource::process()))
    }

    /// Merge the layers. Pure; see the module docs for precedence.
    #[must_use]
    pub fn resolve(overrides: ConfigOverrides, file: ConfigFile, env_source: &EnvSource) -> Self {
        let path = |cli: Option<PathBuf>, var: &str, file: Option<PathBuf>, default: &str| {
            cli.or_else(|| env_source.get(var).map(PathBuf::from))
                .or(file)
                .unwrap_or_else(|| PathBuf::from(default))
        };
        let text = |cli: Option<String>, var: &str, file: Option<String>, default: &str| {
            cli.or_else(|| env_source.get(var)).or(file).unwrap_or_else(|| default.to_string())
        };
        let labels = |file: Option<Vec<String>>, default: &[&str]| {
            file.unwrap_or_else(|| default.iter().map(|s| (*s).to_string()).collect())
        };

        let derived_registry = match (env_source.get(env::AWS_ACCOUNT_ID), env_source.get(env::AWS_REGION)) {
            (Some(account), Some(region)) => Some(format!("{account}.dkr.ecr.{region}.amazonaws.com")),
            _ => None,
        };

        Self {
            repo_root: overrides.repo_root.unwrap_or_else(|| PathBuf::from(".")),
            recipe_path: path(
                overrides.recipe,
                env::RECIPE_PATH,
                file.recipe,
                constants::DEFAULT_RECIPE_PATH,
            ),
            manifests_dir: path(
                overrides.manifests_dir,
                env::MANIFESTS_DIR,
                file.manifests_dir,
                constants::DEFAULT_MANIFESTS_DIR,
            ),
            descriptor_path: path(
                overrides.descriptor,
                env::DESCRIPTOR_PATH,
                file.descriptor,
                constants::DEFAULT_DESCRIPTOR_PATH,
            ),
            base_branch: text(
                overrides.base_branch,
                env::BASE_BRANCH,
                file.base_branch,
                constants::DEFAULT_BASE_BRANCH,
            ),
            handoff_path: path(
                overrides.handoff_file,
                env::HANDOFF_PATH,
                file.handoff_file,
                constants::DEFAULT_HANDOFF_PATH,
            ),
            report_path: path(
                overrides.report_file,
                env::REPORT_PATH,
                file.report_file,
                constants::DEFAULT_REPORT_PATH,
            ),
            image_repository: text(
                overrides.image_repository,
                env::IMAGE_REPOSITORY,
                file.image_repository,
                constants::DEFAULT_IMAGE_REPOSITORY,
            ),
            registry_host: overrides
                .registry_host
                .or_else(|| env_source.get(env::REGISTRY_HOST))
                .or(file.registry_host)
                .or(derived_registry),
            api_url: text(None, env::API_URL, file.api_url, constants::DEFAULT_API_URL),
            insertion_marker: file
                .insertion_marker
                .unwrap_or_else(|| constants::INSERTION_MARKER.to_string()),
            recipe_labels: labels(file.recipe_labels, constants::RECIPE_PR_LABELS),
            descriptor_labels: labels(file.descriptor_labels, constants::DESCRIPTOR_PR_LABELS),
            commit: env_source.get(env::CI_COMMIT),
            repo_owner: overrides
                .repo_owner
                .or_else(|| env_source.get(env::REPO_OWNER_OVERRIDE))
                .or_else(|| env_source.get(env::CI_REPO_OWNER)),
            repo_name: overrides
                .repo_name
                .or_else(|| env_source.get(env::REPO_NAME_OVERRIDE))
                .or_else(|| env_source.get(env::CI_REPO_NAME)),
        }
    }

    /// Recipe location on disk.
    #[must_use]
    pub fn recipe_file(&self) -> PathBuf {
        self.repo_root.join(&self.recipe_path)
    }

    /// Build context directory on disk (the recipe's parent).
    #[must_use]
    pub fn build_context(&self) -> PathBuf {
        self.recipe_file().parent().map_or_else(|| self.repo_root.clone(), Path::to_path_buf)
    }

    #[must_use]
    pub fn manifests_path(&self) -> PathBuf {
        self.repo_root.join(&self.manifests_dir)
    }

    #[must_use]
    pub fn descriptor_file(&self) -> PathBuf {
        self.repo_root.join(&self.descriptor_path)
    }

    /// Image name without tag: `<registry-host>/<repository>`, or just the repository.
    #[must_use]
    pub fn image_name(&self) -> String {
        match &self.registry_host {
            Some(host) => format!("{}/{}", host.trim_end_matches('/'), self.image_repository),
            None => self.image_repository.clone(),
        }
    }

    /// Resolve the token and repository coordinates for hosting API commands.
    ///
    /// Logs whether a token is present (never its value) and the coordinates used.
    pub fn hosting(&self, env_source: &EnvSource) -> Result<HostingSettings, JarflowError> {
        let token = env_source.get(env::GITHUB_TOKEN);
        info!("GitHub token present: {}", token.is_some());
        info!(
            "Repository coordinates: owner={} name={}",
            self.repo_owner.as_deref().unwrap_or("<unset>"),
            self.repo_name.as_deref().unwrap_or("<unset>")
        );

        let token = token.ok_or(JarflowError::MissingToken)?;

        let mut missing = Vec::new();
        if self.repo_owner.is_none() {
            missing.push(format!(
                "repository owner ({} or {})",
                env::REPO_OWNER_OVERRIDE,
                env::CI_REPO_OWNER
            ));
        }
        if self.repo_name.is_none() {
            missing.push(format!(
                "repository name ({} or {})",
                env::REPO_NAME_OVERRIDE,
                env::CI_REPO_NAME
            ));
        }
        match (&self.repo_owner, &self.repo_name) {
            (Some(owner), Some(name)) => Ok(HostingSettings {
                token,
                repo: RepoCoordinates {
                    owner: owner.clone(),
                    name: name.clone(),
                },
                api_url: self.api_url.clone(),
            }),
            _ => Err(JarflowError::MissingRepositoryCoordinates {
                missing,
            }),
        }
    }
}

/// Path rendered with forward slashes, as the hosting API expects.
#[must_use]
pub fn repo_relative(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    text.trim_start_matches("./").to_string()
}
