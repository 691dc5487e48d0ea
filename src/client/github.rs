//! GitHub REST client for repository directory listings

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::inventory::read_response;
use super::retry::RetryPolicy;
use crate::error::{ApiError, Result};

/// Public GitHub API root
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Repositories requested per organization page
const REPOS_PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct RepoOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepoSummary {
    name: String,
    owner: RepoOwner,
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    #[serde(default)]
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: RefObject,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    #[serde(default)]
    path: String,
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct GitTree {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

/// Read-only GitHub client.
///
/// Works unauthenticated, but the public API then allows 60 requests an
/// hour; pass a token for private repositories.
pub struct GitHubClient {
    http: HttpClient,
    api_url: String,
    retry: RetryPolicy,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: Option<&str>, retry: RetryPolicy) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("token {}", token))
                .map_err(|_| ApiError::Auth("GitHub token is not a valid header value".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("invkit/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.api_url, path);
        let url = &url;
        let label = format!("GET {}", path);
        let data = self
            .retry
            .run(&label, || async move {
                let response = self
                    .http
                    .get(url.as_str())
                    .send()
                    .await
                    .map_err(ApiError::from)?;
                read_response::<T>(response).await
            })
            .await?;
        Ok(data)
    }

    /// Every repository of an organization as `owner/name`
    pub async fn org_repos(&self, org: &str) -> Result<Vec<String>> {
        let mut repos = Vec::new();
        let mut page = 1;
        loop {
            let path = format!(
                "/orgs/{}/repos?page={}&per_page={}&type=all",
                org, page, REPOS_PER_PAGE
            );
            let batch: Vec<RepoSummary> = self.get(&path).await?;
            let count = batch.len();
            repos.extend(
                batch
                    .into_iter()
                    .map(|r| format!("{}/{}", r.owner.login, r.name)),
            );
            if count < REPOS_PER_PAGE {
                break;
            }
            page += 1;
        }
        log::debug!("Organization {} has {} repositories", org, repos.len());
        Ok(repos)
    }

    /// The repository's default branch, `main` when unset
    pub async fn default_branch(&self, owner: &str, repo: &str) -> Result<String> {
        let info: RepoInfo = self.get(&format!("/repos/{}/{}", owner, repo)).await?;
        Ok(info
            .default_branch
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| "main".to_string()))
    }

    /// Commit sha the branch points at
    pub async fn branch_sha(&self, owner: &str, repo: &str, branch: &str) -> Result<String> {
        let path = format!("/repos/{}/{}/git/ref/heads/{}", owner, repo, branch);
        match self.get::<GitRef>(&path).await {
            Ok(git_ref) => Ok(git_ref.object.sha),
            Err(crate::error::Error::Api(ApiError::NotFound(_))) => Err(ApiError::NotFound(
                format!(
                    "branch '{}' of {}/{} (repository may not exist or is not accessible)",
                    branch, owner, repo
                ),
            )
            .into()),
            Err(err) => Err(err),
        }
    }

    /// Every directory path of the tree at `sha` outside hidden directories
    pub async fn directory_paths(&self, owner: &str, repo: &str, sha: &str) -> Result<Vec<String>> {
        let path = format!("/repos/{}/{}/git/trees/{}?recursive=1", owner, repo, sha);
        let tree: GitTree = self.get(&path).await?;
        if tree.truncated {
            log::warn!(
                "GitHub truncated the tree of {}/{}; the directory map is incomplete",
                owner,
                repo
            );
        }
        Ok(tree
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "tree" && !is_hidden(&entry.path))
            .map(|entry| entry.path)
            .collect())
    }

    /// Directory paths of a branch, the default branch when `branch` is `None`
    pub async fn repo_directories(
        &self,
        owner: &str,
        repo: &str,
        branch: Option<&str>,
    ) -> Result<Vec<String>> {
        let branch = match branch {
            Some(b) => b.to_string(),
            None => self.default_branch(owner, repo).await?,
        };
        let sha = self.branch_sha(owner, repo, &branch).await?;
        self.directory_paths(owner, repo, &sha).await
    }
}

/// True when any component of `path` is a dot-directory
fn is_hidden(path: &str) -> bool {
    path.split('/').any(|part| part.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(url: &str, token: Option<&str>) -> GitHubClient {
        let retry = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        GitHubClient::new(url, token, retry).unwrap()
    }

    #[tokio::test]
    async fn test_repo_directories_walks_default_branch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/infra")
            .match_header("authorization", "token ghp_x")
            .with_status(200)
            .with_body(r#"{"default_branch":"trunk"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/acme/infra/git/ref/heads/trunk")
            .with_status(200)
            .with_body(r#"{"object":{"sha":"abc123"}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/acme/infra/git/trees/abc123")
            .match_query(Matcher::UrlEncoded("recursive".into(), "1".into()))
            .with_status(200)
            .with_body(
                r#"{"tree":[
                    {"path":"network","type":"tree"},
                    {"path":"network/vpc","type":"tree"},
                    {"path":"network/main.tf","type":"blob"},
                    {"path":"network/.terraform","type":"tree"},
                    {"path":".github","type":"tree"},
                    {"path":".github/workflows","type":"tree"}
                ]}"#,
            )
            .create_async()
            .await;

        let dirs = client(&server.url(), Some("ghp_x"))
            .repo_directories("acme", "infra", None)
            .await
            .unwrap();
        assert_eq!(dirs, vec!["network", "network/vpc"]);
    }

    #[tokio::test]
    async fn test_missing_branch_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/infra/git/ref/heads/dev")
            .with_status(404)
            .create_async()
            .await;

        let err = client(&server.url(), None)
            .repo_directories("acme", "infra", Some("dev"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("branch 'dev'"));
    }

    #[tokio::test]
    async fn test_org_repos_pages_until_short_page() {
        let mut server = mockito::Server::new_async().await;
        let full: Vec<serde_json::Value> = (0..100)
            .map(|i| serde_json::json!({"name": format!("r{}", i), "owner": {"login": "acme"}}))
            .collect();
        server
            .mock("GET", "/orgs/acme/repos")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_status(200)
            .with_body(serde_json::to_string(&full).unwrap())
            .create_async()
            .await;
        server
            .mock("GET", "/orgs/acme/repos")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(200)
            .with_body(r#"[{"name":"last","owner":{"login":"acme"}}]"#)
            .create_async()
            .await;

        let repos = client(&server.url(), None).org_repos("acme").await.unwrap();
        assert_eq!(repos.len(), 101);
        assert_eq!(repos[100], "acme/last");
    }
}
