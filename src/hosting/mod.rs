//! Hosting API abstraction.
//!
//! The publisher and the token check talk to the repository host through the
//! [`HostingApi`] trait. [`GitHubClient`] implements it over the GitHub REST API;
//! tests use the recording mock in `test_utils`.
//!
//! Calls return [`ApiError`], which keeps the HTTP status classes apart so the
//! publisher can decide what to retry and how to report it.

mod github;

pub use github::GitHubClient;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Failure of a single hosting API call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// HTTP 401.
    #[error("authentication rejected: {0}")]
    Unauthorized(String),

    /// HTTP 403.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// HTTP 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Branch creation hit an existing ref.
    #[error("branch '{0}' already exists")]
    BranchExists(String),

    /// Any other non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Transient failures worth one more attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status {
                status, ..
            } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// An open change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    /// Source branch name.
    pub head_ref: String,
}

/// Commit and tree at the tip of a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchTip {
    pub commit_sha: String,
    pub tree_sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPull {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
}

/// What the authenticated identity may do on a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoAccess {
    pub full_name: String,
    pub default_branch: String,
    pub private: bool,
    pub push: bool,
}

/// Operations the pipeline needs from the repository host.
///
/// Implementations are scoped to one repository.
#[allow(async_fn_in_trait)]
pub trait HostingApi {
    /// Login of the identity behind the token.
    async fn current_user(&self) -> Result<String, ApiError>;

    async fn repository_access(&self) -> Result<RepoAccess, ApiError>;

    /// Every open change request targeting `base`.
    async fn list_open_pulls(&self, base: &str) -> Result<Vec<PullRequest>, ApiError>;

    async fn branch_tip(&self, branch: &str) -> Result<BranchTip, ApiError>;

    /// Create one commit on top of `parent` that replaces `files` (path -> content).
    /// Returns the new commit sha. No branch is moved.
    async fn create_commit(
        &self,
        parent: &BranchTip,
        files: &BTreeMap<String, String>,
        message: &str,
    ) -> Result<String, ApiError>;

    /// Create `branch` pointing at `sha`. Fails with [`ApiError::BranchExists`] on collision.
    async fn create_branch(&self, branch: &str, sha: &str) -> Result<(), ApiError>;

    async fn open_pull(&self, pull: &NewPull) -> Result<PullRequest, ApiError>;

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), ApiError>;
}
