//! Error handling for jarflow
//!
//! This module provides the error taxonomy and user-facing error reporting for every
//! pipeline stage. The error system follows two rules:
//! 1. **Strongly-typed errors** so callers can tell preconditions apart
//! 2. **Operator-friendly messages** naming the precondition that failed, with a suggestion
//!
//! # Architecture
//!
//! - [`JarflowError`] - enumerated failure cases across all stages
//! - [`ErrorContext`] - wrapper adding details and a suggestion for CLI display
//!
//! # Error Categories
//!
//! - **Configuration**: [`JarflowError::MissingToken`], [`JarflowError::MissingRepositoryCoordinates`],
//!   [`JarflowError::ConfigError`], [`JarflowError::UnknownChangeKind`]
//! - **Manifests**: [`JarflowError::ManifestParseError`], [`JarflowError::ManifestValidationError`],
//!   [`JarflowError::InstallTargetMismatch`] (all recoverable: the manifest is skipped)
//! - **Hosting API**: [`JarflowError::AuthenticationFailed`], [`JarflowError::PermissionDenied`],
//!   [`JarflowError::HostingApi`]
//! - **Build and handoff**: [`JarflowError::ToolNotFound`], [`JarflowError::ToolCommandFailed`],
//!   [`JarflowError::MissingImageTag`], [`JarflowError::InvalidImageTag`]
//! - **Descriptor**: [`JarflowError::DescriptorFieldNotFound`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use jarflow::core::{JarflowError, user_friendly_error};
//!
//! let err = anyhow::Error::from(JarflowError::MissingImageTag {
//!     path: "/tmp/image-tag.txt".to_string(),
//! });
//! user_friendly_error(err).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Every failure jarflow can report.
#[derive(Error, Debug)]
pub enum JarflowError {
    /// No hosting API token in the environment.
    #[error("No GitHub token provided (GITHUB_TOKEN is not set)")]
    MissingToken,

    /// Repository owner and/or name could not be determined.
    #[error("Repository coordinates are incomplete: missing {}", missing.join(", "))]
    MissingRepositoryCoordinates {
        /// Names of the settings that were absent.
        missing: Vec<String>,
    },

    /// The hosting API rejected the token.
    #[error("GitHub authentication failed for {repository}")]
    AuthenticationFailed {
        repository: String,
    },

    /// The token is valid but lacks the permission for an operation.
    #[error("Permission denied while trying to {operation} on {repository}")]
    PermissionDenied {
        operation: String,
        repository: String,
    },

    /// A hosting API call failed after retries.
    #[error("GitHub API error during {operation}: {reason}")]
    HostingApi {
        operation: String,
        reason: String,
    },

    /// A change classification that the detector does not know.
    #[error("Unknown change type '{kind}' (expected one of: manifest, recipe, any)")]
    UnknownChangeKind {
        kind: String,
    },

    /// A manifest file is not valid JSON or lacks a required field.
    #[error("Invalid manifest file {file}: {reason}")]
    ManifestParseError {
        file: String,
        reason: String,
    },

    /// A manifest parsed but failed semantic validation.
    #[error("Manifest {file} failed validation: {reason}")]
    ManifestValidationError {
        file: String,
        reason: String,
    },

    /// The manifest name does not match the file name its install path targets.
    #[error("Manifest {file}: name '{name}' does not match install target '{install_target}'")]
    InstallTargetMismatch {
        file: String,
        name: String,
        install_target: String,
    },

    /// The build recipe could not be read.
    #[error("Build recipe not found: {path}")]
    RecipeNotFound {
        path: String,
    },

    /// The descriptor contains no image reference for the configured repository.
    #[error("No image reference for '{repository}' found in deployment descriptor {path}")]
    DescriptorFieldNotFound {
        path: String,
        repository: String,
    },

    /// The handoff file is absent or empty.
    #[error("No image tag provided: handoff file {path} is missing or empty")]
    MissingImageTag {
        path: String,
    },

    /// A tag that does not follow the registry tag convention.
    #[error("Invalid image tag '{tag}': {reason}")]
    InvalidImageTag {
        tag: String,
        reason: String,
    },

    /// A commit identifier too short or not hexadecimal.
    #[error("Invalid commit identifier '{commit}'")]
    InvalidCommitId {
        commit: String,
    },

    /// An external tool (docker, git) is not installed.
    #[error("{tool} is not installed or not found in PATH")]
    ToolNotFound {
        tool: String,
    },

    /// An external tool exited unsuccessfully.
    #[error("{tool} {operation} failed")]
    ToolCommandFailed {
        tool: String,
        operation: String,
        stderr: String,
    },

    /// Configuration file or value problems.
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// An error plus operator-facing details and a suggested fix.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error, or `None` when only a message is available.
    pub error: Option<JarflowError>,
    /// Display message used when `error` is `None`.
    pub message: String,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub fn new(error: JarflowError) -> Self {
        Self {
            message: error.to_string(),
            error: Some(error),
            suggestion: None,
            details: None,
        }
    }

    /// Context for errors that did not originate from [`JarflowError`].
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            error: None,
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Print to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

/// Convert any error into an [`ErrorContext`] with a suggestion naming the fix.
///
/// The chain is searched for a [`JarflowError`] so context added with
/// `anyhow::Context` does not hide the precondition that failed.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    // A bare typed error keeps its identity; context-wrapped ones keep their message
    let error = if error.chain().count() == 1 {
        match error.downcast::<JarflowError>() {
            Ok(typed) => {
                let (details, suggestion) = guidance(&typed);
                let mut ctx = ErrorContext::new(typed);
                ctx.details = details;
                ctx.suggestion = suggestion;
                return ctx;
            }
            Err(error) => error,
        }
    } else {
        error
    };

    let mut ctx = ErrorContext::from_message(format!("{error:#}"));
    if let Some(cause) = error.chain().find_map(|cause| cause.downcast_ref::<JarflowError>()) {
        let (details, suggestion) = guidance(cause);
        ctx.details = details;
        ctx.suggestion = suggestion;
    }
    ctx
}

fn guidance(error: &JarflowError) -> (Option<String>, Option<String>) {
    let (details, suggestion): (Option<&str>, Option<String>) = match error {
        JarflowError::MissingToken => (
            Some("Creating branches and pull requests requires an authenticated GitHub API handle"),
            Some("Export GITHUB_TOKEN with a token that has 'repo' scope (or Contents + Pull requests write)".to_string()),
        ),
        JarflowError::MissingRepositoryCoordinates { .. } => (
            Some("The owner and name normally come from CIRCLE_PROJECT_USERNAME and CIRCLE_PROJECT_REPONAME"),
            Some("Set JARFLOW_REPO_OWNER and JARFLOW_REPO_NAME, or pass --repo-owner/--repo-name".to_string()),
        ),
        JarflowError::AuthenticationFailed { repository } => (
            Some("The token was rejected (HTTP 401)"),
            Some(format!(
                "Run `jarflow verify-token` and check the token has access to {repository}"
            )),
        ),
        JarflowError::PermissionDenied { .. } => (
            Some("The token is valid but cannot write to this repository (HTTP 403)"),
            Some("Grant the token push permission: Contents and Pull requests read/write".to_string()),
        ),
        JarflowError::UnknownChangeKind { .. } => (
            None,
            Some("Use --require manifest, --require recipe or --require any".to_string()),
        ),
        JarflowError::MissingImageTag { .. } => (
            Some("The build stage writes the handoff file only after a successful build and push"),
            Some("Check the build job for failures, or pass --tag explicitly".to_string()),
        ),
        JarflowError::DescriptorFieldNotFound { .. } => (
            Some("The image field must look like \"<registry-host>/<repository>:<tag>\""),
            Some("Check IMAGE_REPOSITORY and REGISTRY_HOST match the descriptor".to_string()),
        ),
        JarflowError::RecipeNotFound { .. } => (
            None,
            Some("Set DOCKERFILE_PATH or `recipe` in jarflow.toml".to_string()),
        ),
        JarflowError::ToolNotFound { tool } => {
            (None, Some(format!("Install {tool} and make sure it is on PATH")))
        }
        JarflowError::ToolCommandFailed { stderr, .. } => {
            return (Some(stderr.trim().to_string()).filter(|s| !s.is_empty()), None);
        }
        JarflowError::ConfigError { .. } | JarflowError::TomlError(_) => (
            None,
            Some("Check jarflow.toml syntax and values".to_string()),
        ),
        JarflowError::InvalidImageTag { .. } | JarflowError::InvalidCommitId { .. } => (
            Some("Image tags are the first 7 lowercase hex characters of the commit id"),
            None,
        ),
        _ => (None, None),
    };
    (details.map(str::to_string), suggestion)
}
