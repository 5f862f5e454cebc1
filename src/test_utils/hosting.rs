//! In-memory [`HostingApi`] for tests.

use crate::hosting::{ApiError, BranchTip, HostingApi, NewPull, PullRequest, RepoAccess};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One recorded API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    CurrentUser,
    RepositoryAccess,
    ListOpenPulls {
        base: String,
    },
    BranchTip {
        branch: String,
    },
    CreateCommit {
        parent: String,
        files: BTreeMap<String, String>,
        message: String,
    },
    CreateBranch {
        name: String,
        sha: String,
    },
    OpenPull {
        title: String,
        head: String,
    },
    AddLabels {
        number: u64,
        labels: Vec<String>,
    },
}

/// A pull request held by the mock, with the files of its single commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPull {
    pub number: u64,
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
    pub labels: Vec<String>,
    pub files: BTreeMap<String, String>,
    pub open: bool,
}

impl MockPull {
    fn html_url(&self) -> String {
        format!("https://github.test/acme/nifi/pull/{}", self.number)
    }

    fn to_pull_request(&self) -> PullRequest {
        PullRequest {
            number: self.number,
            title: self.title.clone(),
            html_url: self.html_url(),
            head_ref: self.head.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<MockCall>,
    pulls: Vec<MockPull>,
    /// Branch name -> commit sha.
    branches: BTreeMap<String, String>,
    /// Commit sha -> files written by that commit.
    commits: BTreeMap<String, BTreeMap<String, String>>,
    failures: Vec<(String, ApiError)>,
    push_permission: bool,
}

/// Records calls and keeps branches and pull requests in memory.
///
/// Starts with a `main` branch and push permission.
#[derive(Debug)]
pub struct MockHostingApi {
    state: Mutex<MockState>,
}

impl Default for MockHostingApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHostingApi {
    pub fn new() -> Self {
        let state = MockState {
            branches: BTreeMap::from([("main".to_string(), "base0000".to_string())]),
            push_permission: true,
            ..MockState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next call to `method` (e.g. `"open_pull"`) fail with `error`.
    pub fn fail_next(&self, method: &str, error: ApiError) {
        self.state().failures.push((method.to_string(), error));
    }

    pub fn add_branch(&self, name: &str) {
        self.state().branches.insert(name.to_string(), "existing0".to_string());
    }

    pub fn set_push_permission(&self, push: bool) {
        self.state().push_permission = push;
    }

    /// Mark every open pull request as merged.
    pub fn merge_all(&self) {
        for pull in &mut self.state().pulls {
            pull.open = false;
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    /// Open pull requests in creation order.
    pub fn open_pulls(&self) -> Vec<MockPull> {
        self.state().pulls.iter().filter(|p| p.open).cloned().collect()
    }

    pub fn all_pulls(&self) -> Vec<MockPull> {
        self.state().pulls.clone()
    }

    pub fn branches(&self) -> Vec<String> {
        self.state().branches.keys().cloned().collect()
    }

    fn enter(&self, method: &str, call: MockCall) -> Result<MutexGuard<'_, MockState>, ApiError> {
        let mut state = self.state();
        state.calls.push(call);
        if let Some(index) = state.failures.iter().position(|(m, _)| m == method) {
            let (_, error) = state.failures.remove(index);
            return Err(error);
        }
        Ok(state)
    }
}

impl HostingApi for MockHostingApi {
    async fn current_user(&self) -> Result<String, ApiError> {
        self.enter("current_user", MockCall::CurrentUser)?;
        Ok("jarflow-bot".to_string())
    }

    async fn repository_access(&self) -> Result<RepoAccess, ApiError> {
        let state = self.enter("repository_access", MockCall::RepositoryAccess)?;
        Ok(RepoAccess {
            full_name: "acme/nifi".to_string(),
            default_branch: "main".to_string(),
            private: true,
            push: state.push_permission,
        })
    }

    async fn list_open_pulls(&self, base: &str) -> Result<Vec<PullRequest>, ApiError> {
        let state = self.enter(
            "list_open_pulls",
            MockCall::ListOpenPulls {
                base: base.to_string(),
            },
        )?;
        Ok(state
            .pulls
            .iter()
            .filter(|p| p.open && p.base == base)
            .map(MockPull::to_pull_request)
            .collect())
    }

    async fn branch_tip(&self, branch: &str) -> Result<BranchTip, ApiError> {
        let state = self.enter(
            "branch_tip",
            MockCall::BranchTip {
                branch: branch.to_string(),
            },
        )?;
        let sha = state
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("branch {branch}")))?;
        Ok(BranchTip {
            tree_sha: format!("tree-{sha}"),
            commit_sha: sha,
        })
    }

    async fn create_commit(
        &self,
        parent: &BranchTip,
        files: &BTreeMap<String, String>,
        message: &str,
    ) -> Result<String, ApiError> {
        let mut state = self.enter(
            "create_commit",
            MockCall::CreateCommit {
                parent: parent.commit_sha.clone(),
                files: files.clone(),
                message: message.to_string(),
            },
        )?;
        let sha = format!("commit{:04}", state.commits.len() + 1);
        state.commits.insert(sha.clone(), files.clone());
        Ok(sha)
    }

    async fn create_branch(&self, branch: &str, sha: &str) -> Result<(), ApiError> {
        let mut state = self.enter(
            "create_branch",
            MockCall::CreateBranch {
                name: branch.to_string(),
                sha: sha.to_string(),
            },
        )?;
        if state.branches.contains_key(branch) {
            return Err(ApiError::BranchExists(branch.to_string()));
        }
        state.branches.insert(branch.to_string(), sha.to_string());
        Ok(())
    }

    async fn open_pull(&self, pull: &NewPull) -> Result<PullRequest, ApiError> {
        let mut state = self.enter(
            "open_pull",
            MockCall::OpenPull {
                title: pull.title.clone(),
                head: pull.head.clone(),
            },
        )?;
        let files = state
            .branches
            .get(&pull.head)
            .and_then(|sha| state.commits.get(sha))
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 422,
                message: format!("head branch {} has no commits", pull.head),
            })?;
        let created = MockPull {
            number: state.pulls.len() as u64 + 1,
            title: pull.title.clone(),
            head: pull.head.clone(),
            base: pull.base.clone(),
            body: pull.body.clone(),
            labels: Vec::new(),
            files,
            open: true,
        };
        let result = created.to_pull_request();
        state.pulls.push(created);
        Ok(result)
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), ApiError> {
        let mut state = self.enter(
            "add_labels",
            MockCall::AddLabels {
                number,
                labels: labels.to_vec(),
            },
        )?;
        let pull = state
            .pulls
            .iter_mut()
            .find(|p| p.number == number)
            .ok_or_else(|| ApiError::NotFound(format!("pull {number}")))?;
        pull.labels.extend(labels.iter().cloned());
        Ok(())
    }
}
