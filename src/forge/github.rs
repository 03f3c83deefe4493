//! GitHub REST client for the fork-and-pull-request workflow.

use crate::config::{Credentials, RepoSlug, Settings};
use crate::error::{FireantError, Result};
use crate::forge::{PullRequest, PullRequestForge, UpgradeRequest};
use base64::{Engine, prelude::BASE64_STANDARD};
use log::{debug, info};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GitHubForge {
    client: Client,
    base_url: Url,
    upstream: RepoSlug,
    fork: RepoSlug,
    main_branch: String,
    per_page: u32,
    credentials: Credentials,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreateRef<'a> {
    #[serde(rename = "ref")]
    reference: String,
    sha: &'a str,
}

#[derive(Debug, Deserialize)]
struct FileContents {
    sha: String,
}

#[derive(Debug, Serialize)]
struct Committer<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateFile<'a> {
    message: &'a str,
    content: String,
    sha: &'a str,
    branch: &'a str,
    committer: Committer<'a>,
}

#[derive(Debug, Serialize)]
struct CreatePull<'a> {
    title: &'a str,
    body: &'a str,
    head: String,
    base: &'a str,
    maintainer_can_modify: bool,
}

#[derive(Debug, Deserialize)]
struct PullSummary {
    number: u64,
    title: String,
    html_url: String,
}

#[derive(Debug, Serialize)]
struct MergeUpstream<'a> {
    branch: &'a str,
}

impl GitHubForge {
    pub fn new(settings: &Settings, credentials: Credentials) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .user_agent("fireant")
            .build()
            .map_err(|e| FireantError::forge(format!("Cannot build HTTP client: {e}")))?;

        let mut base = settings.github_api_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| FireantError::config(format!("Invalid GitHub API URL: {e}")))?;

        Ok(Self {
            client,
            base_url,
            upstream: settings.remote_slug()?,
            fork: settings.forked_slug()?,
            main_branch: settings.main_branch.clone(),
            per_page: settings.pulls_per_page,
            credentials,
        })
    }

    fn endpoint(&self, repo: &RepoSlug, path: &str) -> Result<Url> {
        self.base_url
            .join(&format!("repos/{}/{}/{path}", repo.owner, repo.name))
            .map_err(|e| FireantError::forge(format!("Invalid API path '{path}': {e}")))
    }

    fn send(&self, request: RequestBuilder, context: &str) -> Result<Response> {
        request
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .map_err(|e| FireantError::forge(format!("{context}: {e}")))
    }

    fn check(response: Response, context: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(FireantError::forge(format!(
            "{context}: HTTP {status}: {}",
            body.trim()
        )))
    }

    fn json<T: for<'de> Deserialize<'de>>(response: Response, context: &str) -> Result<T> {
        response
            .json()
            .map_err(|e| FireantError::forge(format!("{context}: unreadable response: {e}")))
    }

    fn main_branch_sha(&self) -> Result<String> {
        let context = "Reading fork main branch";
        let url = self.endpoint(
            &self.fork,
            &format!("git/ref/heads/{}", self.main_branch),
        )?;
        let response = Self::check(self.send(self.client.get(url), context)?, context)?;
        let git_ref: GitRef = Self::json(response, context)?;
        Ok(git_ref.object.sha)
    }

    fn create_branch(&self, branch: &str, sha: &str) -> Result<()> {
        let context = "Creating branch";
        let url = self.endpoint(&self.fork, "git/refs")?;
        let body = CreateRef {
            reference: format!("refs/heads/{branch}"),
            sha,
        };
        let response = self.send(self.client.post(url).json(&body), context)?;
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(FireantError::BranchExists(branch.to_string()));
        }
        Self::check(response, context)?;
        Ok(())
    }

    fn file_sha(&self, git_path: &str, branch: &str) -> Result<String> {
        let context = format!("Reading {git_path}");
        let url = self.endpoint(&self.fork, &format!("contents/{git_path}"))?;
        let request = self.client.get(url).query(&[("ref", branch)]);
        let response = Self::check(self.send(request, &context)?, &context)?;
        let contents: FileContents = Self::json(response, &context)?;
        Ok(contents.sha)
    }

    fn commit_file(&self, request: &UpgradeRequest, sha: &str) -> Result<()> {
        let context = format!("Committing {}", request.git_path);
        let url = self.endpoint(&self.fork, &format!("contents/{}", request.git_path))?;
        let body = UpdateFile {
            message: &request.title,
            content: BASE64_STANDARD.encode(request.content.as_bytes()),
            sha,
            branch: &request.branch,
            committer: Committer {
                name: &self.credentials.username,
                email: &self.credentials.email,
            },
        };
        Self::check(self.send(self.client.put(url).json(&body), &context)?, &context)?;
        Ok(())
    }

    fn create_pull(&self, request: &UpgradeRequest) -> Result<PullRequest> {
        let context = "Opening pull request";
        let url = self.endpoint(&self.upstream, "pulls")?;
        let body = CreatePull {
            title: &request.title,
            body: &request.body,
            head: head_ref(&self.fork, &request.branch),
            base: &self.main_branch,
            maintainer_can_modify: true,
        };
        let response = Self::check(self.send(self.client.post(url).json(&body), context)?, context)?;
        let pull: PullSummary = Self::json(response, context)?;
        Ok(PullRequest {
            number: pull.number,
            url: pull.html_url,
        })
    }
}

impl PullRequestForge for GitHubForge {
    fn open_pull_request_titles(&self) -> Result<HashSet<String>> {
        let context = "Listing open pull requests";
        let url = self.endpoint(&self.upstream, "pulls")?;
        let per_page = self.per_page.to_string();
        let mut titles = HashSet::new();

        for page in 1u32.. {
            let page_str = page.to_string();
            let request = self.client.get(url.clone()).query(&[
                ("state", "open"),
                ("per_page", per_page.as_str()),
                ("page", page_str.as_str()),
            ]);
            let response = Self::check(self.send(request, context)?, context)?;
            let pulls: Vec<PullSummary> = Self::json(response, context)?;
            let fetched = pulls.len();
            titles.extend(pulls.into_iter().map(|pull| pull.title));
            debug!("Fetched page {page} of open pull requests ({fetched} entries)");
            if fetched < self.per_page as usize {
                break;
            }
        }

        Ok(titles)
    }

    fn sync_fork(&self) -> Result<()> {
        let context = "Syncing fork";
        let url = self.endpoint(&self.fork, "merge-upstream")?;
        let body = MergeUpstream {
            branch: &self.main_branch,
        };
        Self::check(self.send(self.client.post(url).json(&body), context)?, context)?;
        info!("Synced {} with {}", self.fork, self.upstream);
        Ok(())
    }

    fn submit_upgrade(&self, request: &UpgradeRequest) -> Result<PullRequest> {
        let sha = self.main_branch_sha()?;
        self.create_branch(&request.branch, &sha)?;
        let file_sha = self.file_sha(&request.git_path, &request.branch)?;
        self.commit_file(request, &file_sha)?;
        self.create_pull(request)
    }
}

/// `owner:branch` form GitHub expects for cross-repository pull requests.
fn head_ref(fork: &RepoSlug, branch: &str) -> String {
    format!("{}:{branch}", fork.owner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forge() -> GitHubForge {
        let credentials = Credentials {
            username: "fireant-bot".into(),
            password: "secret".into(),
            email: "bot@example.org".into(),
        };
        GitHubForge::new(&Settings::default(), credentials).unwrap()
    }

    #[test]
    fn endpoints_target_the_right_repository() {
        let forge = forge();
        assert_eq!(
            forge.endpoint(&forge.upstream, "pulls").unwrap().as_str(),
            "https://api.github.com/repos/apache/nutch/pulls"
        );
        assert_eq!(
            forge
                .endpoint(&forge.fork, "contents/src/plugin/parse-tika/ivy.xml")
                .unwrap()
                .as_str(),
            "https://api.github.com/repos/fireant-ci/nutch/contents/src/plugin/parse-tika/ivy.xml"
        );
    }

    #[test]
    fn enterprise_api_prefix_is_kept() {
        let settings = Settings {
            github_api_url: "https://github.example.com/api/v3".into(),
            ..Settings::default()
        };
        let credentials = Credentials {
            username: "u".into(),
            password: "p".into(),
            email: "e@example.org".into(),
        };
        let forge = GitHubForge::new(&settings, credentials).unwrap();
        assert_eq!(
            forge.endpoint(&forge.fork, "git/refs").unwrap().as_str(),
            "https://github.example.com/api/v3/repos/fireant-ci/nutch/git/refs"
        );
    }

    #[test]
    fn pull_request_head_names_the_fork_owner() {
        let forge = forge();
        assert_eq!(
            head_ref(&forge.fork, "fireant_slf4j-api_1.7.32"),
            "fireant-ci:fireant_slf4j-api_1.7.32"
        );
    }

    #[test]
    fn request_bodies_match_the_rest_api() {
        let create_ref = CreateRef {
            reference: "refs/heads/fireant_x_1.0".into(),
            sha: "abc123",
        };
        assert_eq!(
            serde_json::to_value(&create_ref).unwrap(),
            serde_json::json!({"ref": "refs/heads/fireant_x_1.0", "sha": "abc123"})
        );

        let update = UpdateFile {
            message: "msg",
            content: BASE64_STANDARD.encode("<ivy-module/>"),
            sha: "def",
            branch: "b",
            committer: Committer {
                name: "n",
                email: "e",
            },
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["content"], "PGl2eS1tb2R1bGUvPg==");
        assert_eq!(value["committer"]["email"], "e");
    }

    #[test]
    fn ref_response_yields_commit_sha() {
        let body = r#"{"ref": "refs/heads/master", "object": {"sha": "aa218f56", "type": "commit"}}"#;
        let parsed: GitRef = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.object.sha, "aa218f56");
    }
}
