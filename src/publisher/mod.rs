//! Idempotent change-request publishing.
//!
//! [`PrPublisher::ensure_change_request`] opens at most one change request per
//! logical change. The title is derived deterministically from the payload; if an
//! open request with the same title already targets the base branch, nothing is
//! written. This title check is the only guard against duplicate requests from
//! re-triggered runs.
//!
//! A new request is written as exactly one commit on a fresh branch cut from the
//! base branch tip. Branch name collisions are resolved by appending a UTC
//! timestamp. Transient API failures are retried once with backoff.

pub mod body;

pub use body::{descriptor_change_request, recipe_change_request};

use crate::core::JarflowError;
use crate::hosting::{ApiError, HostingApi, NewPull};
use crate::utils::backoff::{RetryPolicy, retry_with_backoff};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

/// Everything needed to open one change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequestSpec {
    /// Deterministic title; the idempotency key.
    pub title: String,
    /// Preferred branch name; a suffix is added if it is taken.
    pub branch_hint: String,
    /// Repository-relative path -> full new content.
    pub files: BTreeMap<String, String>,
    pub body: String,
    pub labels: Vec<String>,
    pub commit_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Created {
        number: u64,
        url: String,
        branch: String,
    },
    SkippedAlreadyOpen {
        number: u64,
        url: String,
    },
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created {
                number,
                url,
                ..
            } => write!(f, "created #{number}: {url}"),
            Self::SkippedAlreadyOpen {
                number,
                url,
            } => write!(f, "skipped, already open as #{number}: {url}"),
        }
    }
}

/// Publishes change requests against one repository and base branch.
pub struct PrPublisher<'a, H: HostingApi> {
    api: &'a H,
    repository: String,
    base_branch: String,
    retry: RetryPolicy,
}

impl<'a, H: HostingApi> PrPublisher<'a, H> {
    pub fn new(api: &'a H, repository: impl Into<String>, base_branch: impl Into<String>) -> Self {
        Self {
            api,
            repository: repository.into(),
            base_branch: base_branch.into(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Open the change request unless one with the same title is already open.
    pub async fn ensure_change_request(
        &self,
        spec: &ChangeRequestSpec,
    ) -> Result<PublishOutcome, JarflowError> {
        let api = self.api;
        let base = self.base_branch.as_str();

        let open = self
            .call("list open pull requests", || api.list_open_pulls(base))
            .await?;
        if let Some(existing) = open.iter().find(|pr| pr.title == spec.title) {
            info!("Pull request already open: #{} {}", existing.number, existing.html_url);
            return Ok(PublishOutcome::SkippedAlreadyOpen {
                number: existing.number,
                url: existing.html_url.clone(),
            });
        }

        let tip = self.call("read base branch", || api.branch_tip(base)).await?;
        let commit = self
            .call("create commit", || api.create_commit(&tip, &spec.files, &spec.commit_message))
            .await?;
        let branch = self.create_branch(&spec.branch_hint, &commit).await?;

        let pull = NewPull {
            title: spec.title.clone(),
            head: branch.clone(),
            base: self.base_branch.clone(),
            body: spec.body.clone(),
        };
        let created = self.call("open pull request", || api.open_pull(&pull)).await?;
        info!("Created pull request #{}: {}", created.number, created.html_url);

        if !spec.labels.is_empty() {
            if let Err(e) = api.add_labels(created.number, &spec.labels).await {
                warn!("Could not add labels {:?} to #{}: {}", spec.labels, created.number, e);
            }
        }

        Ok(PublishOutcome::Created {
            number: created.number,
            url: created.html_url,
            branch,
        })
    }

    /// Create the branch under `hint`, or `hint-<timestamp>` if `hint` is taken.
    async fn create_branch(&self, hint: &str, sha: &str) -> Result<String, JarflowError> {
        let api = self.api;
        let mut name = hint.to_string();
        let mut suffixed = false;
        loop {
            let attempt = name.as_str();
            let result = retry_with_backoff(
                "create branch",
                self.retry,
                || api.create_branch(attempt, sha),
                ApiError::is_retryable,
            )
            .await;
            match result {
                Ok(()) => return Ok(name),
                Err(ApiError::BranchExists(_)) if !suffixed => {
                    let stamped = format!("{hint}-{}", Utc::now().format("%Y%m%d-%H%M%S"));
                    warn!("Branch {} already exists, using {}", name, stamped);
                    name = stamped;
                    suffixed = true;
                }
                Err(e) => return Err(self.map_error("create branch", e)),
            }
        }
    }

    async fn call<T, F, Fut>(&self, operation: &str, action: F) -> Result<T, JarflowError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ApiError>>,
    {
        retry_with_backoff(operation, self.retry, action, ApiError::is_retryable)
            .await
            .map_err(|e| self.map_error(operation, e))
    }

    fn map_error(&self, operation: &str, error: ApiError) -> JarflowError {
        map_api_error(&self.repository, operation, error)
    }
}

/// Translate a hosting API failure into the crate error taxonomy.
pub fn map_api_error(repository: &str, operation: &str, error: ApiError) -> JarflowError {
    match error {
        ApiError::Unauthorized(_) => JarflowError::AuthenticationFailed {
            repository: repository.to_string(),
        },
        ApiError::Forbidden(_) => JarflowError::PermissionDenied {
            operation: operation.to_string(),
            repository: repository.to_string(),
        },
        other => JarflowError::HostingApi {
            operation: operation.to_string(),
            reason: other.to_string(),
        },
    }
}
