use super::{ApiError, BranchTip, HostingApi, NewPull, PullRequest, RepoAccess};
use crate::config::HostingSettings;
use crate::constants::{API_REQUEST_TIMEOUT, PULLS_PAGE_SIZE};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::debug;

const USER_AGENT_STRING: &str = concat!("jarflow/", env!("CARGO_PKG_VERSION"));
const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

/// GitHub REST client bound to one repository.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    api_url: String,
    owner: String,
    repo: String,
}

#[derive(Deserialize)]
struct UserBody {
    login: String,
}

#[derive(Deserialize, Default)]
struct PermissionsBody {
    #[serde(default)]
    push: bool,
}

#[derive(Deserialize)]
struct RepoBody {
    full_name: String,
    default_branch: String,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    permissions: Option<PermissionsBody>,
}

#[derive(Deserialize)]
struct HeadBody {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Deserialize)]
struct PullBody {
    number: u64,
    title: String,
    html_url: String,
    head: HeadBody,
}

impl From<PullBody> for PullRequest {
    fn from(body: PullBody) -> Self {
        Self {
            number: body.number,
            title: body.title,
            html_url: body.html_url,
            head_ref: body.head.name,
        }
    }
}

#[derive(Deserialize)]
struct ShaBody {
    sha: String,
}

#[derive(Deserialize)]
struct RefBody {
    object: ShaBody,
}

#[derive(Deserialize)]
struct CommitBody {
    tree: ShaBody,
}

impl GitHubClient {
    pub fn new(settings: &HostingSettings) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_MEDIA_TYPE));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", settings.token))
            .map_err(|_| ApiError::Transport("token contains invalid header characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(API_REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            owner: settings.repo.owner.clone(),
            repo: settings.repo.name.clone(),
        })
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}{}", self.api_url, self.owner, self.repo, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        debug!("GitHub API {} {}", method, url);
        self.client.request(method, url)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = builder.send().await.map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }
        response.json::<T>().await.map_err(|e| ApiError::Transport(format!("unexpected response body: {e}")))
    }
}

/// Turn a non-success response into an [`ApiError`].
fn classify_failure(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
        StatusCode::FORBIDDEN => ApiError::Forbidden(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        _ => ApiError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

impl HostingApi for GitHubClient {
    async fn current_user(&self) -> Result<String, ApiError> {
        let url = format!("{}/user", self.api_url);
        let user: UserBody = self.send(self.request(Method::GET, &url)).await?;
        Ok(user.login)
    }

    async fn repository_access(&self) -> Result<RepoAccess, ApiError> {
        let url = self.repo_url("");
        let repo: RepoBody = self.send(self.request(Method::GET, &url)).await?;
        Ok(RepoAccess {
            full_name: repo.full_name,
            default_branch: repo.default_branch,
            private: repo.private,
            push: repo.permissions.unwrap_or_default().push,
        })
    }

    async fn list_open_pulls(&self, base: &str) -> Result<Vec<PullRequest>, ApiError> {
        let url = self.repo_url("/pulls");
        let mut pulls = Vec::new();
        let mut page = 1usize;
        loop {
            let batch: Vec<PullBody> = self
                .send(self.request(Method::GET, &url).query(&[
                    ("state", "open".to_string()),
                    ("base", base.to_string()),
                    ("per_page", PULLS_PAGE_SIZE.to_string()),
                    ("page", page.to_string()),
                ]))
                .await?;
            let count = batch.len();
            pulls.extend(batch.into_iter().map(PullRequest::from));
            if count < PULLS_PAGE_SIZE {
                break;
            }
            page += 1;
        }
        debug!("{} open pull request(s) against {}", pulls.len(), base);
        Ok(pulls)
    }

    async fn branch_tip(&self, branch: &str) -> Result<BranchTip, ApiError> {
        let url = self.repo_url(&format!("/git/ref/heads/{branch}"));
        let head: RefBody = self.send(self.request(Method::GET, &url)).await?;
        let url = self.repo_url(&format!("/git/commits/{}", head.object.sha));
        let commit: CommitBody = self.send(self.request(Method::GET, &url)).await?;
        Ok(BranchTip {
            commit_sha: head.object.sha,
            tree_sha: commit.tree.sha,
        })
    }

    async fn create_commit(
        &self,
        parent: &BranchTip,
        files: &BTreeMap<String, String>,
        message: &str,
    ) -> Result<String, ApiError> {
        let entries: Vec<Value> = files
            .iter()
            .map(|(path, content)| {
                json!({ "path": path, "mode": "100644", "type": "blob", "content": content })
            })
            .collect();

        let url = self.repo_url("/git/trees");
        let tree: ShaBody = self
            .send(
                self.request(Method::POST, &url)
                    .json(&json!({ "base_tree": parent.tree_sha, "tree": entries })),
            )
            .await?;

        let url = self.repo_url("/git/commits");
        let commit: ShaBody = self
            .send(self.request(Method::POST, &url).json(&json!({
                "message": message,
                "tree": tree.sha,
                "parents": [parent.commit_sha],
            })))
            .await?;
        Ok(commit.sha)
    }

    async fn create_branch(&self, branch: &str, sha: &str) -> Result<(), ApiError> {
        let url = self.repo_url("/git/refs");
        let result: Result<Value, ApiError> = self
            .send(
                self.request(Method::POST, &url)
                    .json(&json!({ "ref": format!("refs/heads/{branch}"), "sha": sha })),
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(ApiError::Status {
                status: 422,
                message,
            }) if message.contains("already exists") => Err(ApiError::BranchExists(branch.to_string())),
            Err(e) => Err(e),
        }
    }

    async fn open_pull(&self, pull: &NewPull) -> Result<PullRequest, ApiError> {
        let url = self.repo_url("/pulls");
        let body: PullBody = self
            .send(self.request(Method::POST, &url).json(&json!({
                "title": pull.title,
                "head": pull.head,
                "base": pull.base,
                "body": pull.body,
            })))
            .await?;
        Ok(body.into())
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), ApiError> {
        let url = self.repo_url(&format!("/issues/{number}/labels"));
        let _: Value =
            self.send(self.request(Method::POST, &url).json(&json!({ "labels": labels }))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepoCoordinates;

    #[test]
    fn test_failure_classification_uses_api_message() {
        let err = classify_failure(StatusCode::UNAUTHORIZED, r#"{"message":"Bad credentials"}"#);
        assert_eq!(err, ApiError::Unauthorized("Bad credentials".into()));

        let err = classify_failure(StatusCode::FORBIDDEN, "rate limited");
        assert_eq!(err, ApiError::Forbidden("rate limited".into()));

        let err = classify_failure(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message":"Reference already exists"}"#,
        );
        assert_eq!(
            err,
            ApiError::Status {
                status: 422,
                message: "Reference already exists".into()
            }
        );
    }

    #[test]
    fn test_repo_url() {
        let client = GitHubClient::new(&HostingSettings {
            token: "t0ken".into(),
            repo: RepoCoordinates {
                owner: "acme".into(),
                name: "nifi".into(),
            },
            api_url: "https://ghe.example.com/api/v3/".into(),
        })
        .unwrap();
        assert_eq!(client.repo_url("/pulls"), "https://ghe.example.com/api/v3/repos/acme/nifi/pulls");
    }

    #[test]
    fn test_rejects_token_with_newline() {
        let result = GitHubClient::new(&HostingSettings {
            token: "bad\ntoken".into(),
            repo: RepoCoordinates {
                owner: "acme".into(),
                name: "nifi".into(),
            },
            api_url: "https://api.github.com".into(),
        });
        assert!(result.is_err());
    }
}
