//! Repositories to map, and where their directories come from

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::mapping::{DirTree, Mapping, RepoMapping};
use crate::client::GitHubClient;
use crate::error::{Error, Result};

static URL_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^/]+/?(?P<path>[^?#]*)").expect("valid regex"));

/// A mapping target given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoTarget {
    Repo { owner: String, repo: String },
    Org(String),
}

impl RepoTarget {
    /// Parse `owner/repo`, a bare organization, or a GitHub URL to either
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let path = match URL_PATH.captures(input) {
            Some(caps) => caps.name("path").map_or("", |m| m.as_str()),
            None => input,
        };
        let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
        let is_url = URL_PATH.is_match(input);

        match parts.as_slice() {
            [""] => Err(Error::Other(format!("no repository in '{}'", input))),
            [org] => Ok(RepoTarget::Org(org.to_string())),
            [owner, repo] => Ok(Self::repo(owner, repo)),
            [owner, repo, ..] if is_url => Ok(Self::repo(owner, repo)),
            _ => Err(Error::Other(format!(
                "'{}' is not owner/repo, an organization or a GitHub URL",
                input
            ))),
        }
    }

    fn repo(owner: &str, repo: &str) -> Self {
        RepoTarget::Repo {
            owner: owner.to_string(),
            repo: repo.trim_end_matches(".git").to_string(),
        }
    }
}

/// Where repository listings and directory paths come from
#[async_trait]
pub trait RepoSource: Send + Sync {
    /// Every repository of an organization as `owner/name`
    async fn org_repos(&self, org: &str) -> Result<Vec<String>>;

    /// Non-hidden directory paths on the default branch
    async fn repo_directories(&self, owner: &str, repo: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl RepoSource for GitHubClient {
    async fn org_repos(&self, org: &str) -> Result<Vec<String>> {
        GitHubClient::org_repos(self, org).await
    }

    async fn repo_directories(&self, owner: &str, repo: &str) -> Result<Vec<String>> {
        GitHubClient::repo_directories(self, owner, repo, None).await
    }
}

async fn map_repo<S: RepoSource + ?Sized>(source: &S, owner: &str, repo: &str) -> RepoMapping {
    match source.repo_directories(owner, repo).await {
        Ok(paths) => {
            let tree = DirTree::from_paths(&paths);
            log::info!("{}/{}: {} directories", owner, repo, tree.count());
            RepoMapping::Tree(tree)
        }
        Err(e) => {
            log::warn!("Cannot map {}/{}: {}", owner, repo, e);
            RepoMapping::Failed {
                error: e.to_string(),
            }
        }
    }
}

/// Map every target. Failures are recorded in the mapping, never raised.
///
/// A failed organization listing is stored under `owner/*`.
pub async fn map_targets<S: RepoSource + ?Sized>(source: &S, targets: &[RepoTarget]) -> Mapping {
    let mut mapping = Mapping::new();
    for target in targets {
        match target {
            RepoTarget::Repo { owner, repo } => {
                let entry = map_repo(source, owner, repo).await;
                mapping.insert(format!("{}/{}", owner, repo), entry);
            }
            RepoTarget::Org(org) => match source.org_repos(org).await {
                Ok(repos) => {
                    log::info!("Organization {} has {} repositories", org, repos.len());
                    for full_name in repos {
                        let Some((owner, repo)) = full_name.split_once('/') else {
                            continue;
                        };
                        let entry = map_repo(source, owner, repo).await;
                        mapping.insert(full_name.clone(), entry);
                    }
                }
                Err(e) => {
                    log::warn!("Cannot list repositories of {}: {}", org, e);
                    mapping.insert(
                        format!("{}/*", org),
                        RepoMapping::Failed {
                            error: e.to_string(),
                        },
                    );
                }
            },
        }
    }
    mapping
}
