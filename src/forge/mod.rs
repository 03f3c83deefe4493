use crate::error::Result;
use std::collections::HashSet;

pub mod github;
pub use github::GitHubForge;

/// One dependency upgrade ready to be pushed to the fork and proposed upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    pub branch: String,
    /// Repository-relative path of the edited manifest.
    pub git_path: String,
    pub content: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
}

/// Pull-request side of the fork workflow.
pub trait PullRequestForge: Send + Sync {
    /// Titles of every open pull request against the upstream repository.
    fn open_pull_request_titles(&self) -> Result<HashSet<String>>;

    /// Bring the fork's main branch up to date with upstream.
    fn sync_fork(&self) -> Result<()>;

    /// Branch off the fork's main branch, commit the new manifest content
    /// and open a pull request upstream.
    fn submit_upgrade(&self, request: &UpgradeRequest) -> Result<PullRequest>;
}
