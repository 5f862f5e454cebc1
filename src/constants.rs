//! Global constants used throughout the jarflow codebase.
//!
//! This module contains default paths, environment variable names, retry
//! parameters, and other values shared across stages. Defining them
//! centrally keeps the CI-facing contract in one discoverable place.

use std::time::Duration;

/// Default location of the build recipe (Dockerfile), relative to the repository root.
pub const DEFAULT_RECIPE_PATH: &str = "custom_nifi/Dockerfile";

/// Default directory holding the JAR manifests.
pub const DEFAULT_MANIFESTS_DIR: &str = "custom_nifi/jars";

/// Default deployment descriptor (ECS task definition).
pub const DEFAULT_DESCRIPTOR_PATH: &str = "ecs_task_definition.tf";

/// Default base branch that change requests target.
pub const DEFAULT_BASE_BRANCH: &str = "main";

/// Default run-scoped handoff file carrying the image tag between stages.
pub const DEFAULT_HANDOFF_PATH: &str = "/tmp/image-tag.txt";

/// Default location of the JSON diff report written by every scan.
pub const DEFAULT_REPORT_PATH: &str = "/tmp/jar-diff-report.json";

/// File name used for the patched recipe when publishing fails.
pub const FAILED_RECIPE_FILE_NAME: &str = "updated-Dockerfile";

/// Default image repository inside the registry.
pub const DEFAULT_IMAGE_REPOSITORY: &str = "apache-nifi-with-custom-jars-repo";

/// Default hosting API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Name of the optional project configuration file.
pub const CONFIG_FILE_NAME: &str = "jarflow.toml";

/// File extension of manifest files in the manifests directory.
pub const MANIFEST_EXTENSION: &str = "json";

/// Extension every dependency file name must carry.
pub const ARTIFACT_EXTENSION: &str = ".jar";

/// Number of hex characters of the commit id used as the image tag.
pub const IMAGE_TAG_WIDTH: usize = 7;

/// Floating alias pushed alongside every commit tag.
pub const LATEST_TAG: &str = "latest";

/// Comment line new fetch directives are inserted above, when present.
pub const INSERTION_MARKER: &str = "# NEW JARS WILL BE ADDED AUTOMATICALLY ABOVE THIS LINE";

/// Labels attached to recipe change requests.
pub const RECIPE_PR_LABELS: &[&str] = &["automated", "jar-update"];

/// Labels attached to descriptor change requests.
pub const DESCRIPTOR_PR_LABELS: &[&str] = &["automated", "infrastructure", "ecs"];

/// Delay before the single retry of a failed hosting API call.
pub const API_RETRY_DELAY_MS: u64 = 500;

/// Number of retries for a failed hosting API call.
pub const API_RETRY_ATTEMPTS: usize = 1;

/// Page size used when listing open change requests.
pub const PULLS_PAGE_SIZE: usize = 100;

/// Timeout for individual hosting API requests (30 seconds).
pub const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for git invocations (60 seconds).
pub const GIT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for `docker build` (30 minutes).
///
/// Fetch directives download JARs from remote repositories, so a cold
/// build can be slow on shared CI runners.
pub const DOCKER_BUILD_TIMEOUT: Duration = Duration::from_secs(1800);

/// Timeout for each `docker push` (10 minutes).
pub const DOCKER_PUSH_TIMEOUT: Duration = Duration::from_secs(600);

/// Environment variable names read by the configuration layer.
pub mod env {
    pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
    pub const REPO_OWNER_OVERRIDE: &str = "JARFLOW_REPO_OWNER";
    pub const REPO_NAME_OVERRIDE: &str = "JARFLOW_REPO_NAME";
    pub const CI_REPO_OWNER: &str = "CIRCLE_PROJECT_USERNAME";
    pub const CI_REPO_NAME: &str = "CIRCLE_PROJECT_REPONAME";
    pub const CI_COMMIT: &str = "CIRCLE_SHA1";
    pub const AWS_ACCOUNT_ID: &str = "AWS_ACCOUNT_ID";
    pub const AWS_REGION: &str = "AWS_REGION";
    pub const RECIPE_PATH: &str = "DOCKERFILE_PATH";
    pub const MANIFESTS_DIR: &str = "JARS_FOLDER";
    pub const DESCRIPTOR_PATH: &str = "TASK_DEF_PATH";
    pub const BASE_BRANCH: &str = "TARGET_BRANCH";
    pub const HANDOFF_PATH: &str = "IMAGE_TAG_FILE";
    pub const REPORT_PATH: &str = "JAR_DIFF_REPORT";
    pub const IMAGE_REPOSITORY: &str = "IMAGE_REPOSITORY";
    pub const REGISTRY_HOST: &str = "REGISTRY_HOST";
    pub const API_URL: &str = "GITHUB_API_URL";
    pub const CONFIG_PATH: &str = "JARFLOW_CONFIG";
}
