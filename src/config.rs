use crate::error::{FireantError, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "fireant.toml";

const DEFAULT_MAVEN_SEARCH_URL: &str = "https://search.maven.org/solrsearch/select?q=g:{group}%20AND%20a:{artifact}&core=gav&start=0&rows=20";
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_REMOTE_REPO: &str = "https://github.com/apache/nutch";
const DEFAULT_FORKED_REPO: &str = "https://github.com/fireant-ci/nutch";

pub const ENV_REMOTE_REPO: &str = "FIREANT_REMOTE_REPO";
pub const ENV_FORKED_REPO: &str = "FIREANT_FORKED_REPO";
pub const ENV_GITHUB_USERNAME: &str = "FIREANT_GITHUB_USERNAME";
pub const ENV_GITHUB_PASSWORD: &str = "FIREANT_GITHUB_PASSWORD";
pub const ENV_GITHUB_EMAIL: &str = "FIREANT_GITHUB_EMAIL";

/// Run settings, read once at startup and passed down by reference.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub lookup_workers: usize,
    pub upgrade_workers: usize,
    pub maximum_dependencies: usize,
    pub repo_path: PathBuf,
    pub manifest_glob: String,
    pub main_branch: String,
    pub pulls_per_page: u32,
    pub http_retry_attempts: u32,
    /// Pause before the first lookup retry; doubles on every further retry.
    pub http_retry_backoff_ms: u64,
    pub maven_search_url: String,
    pub github_api_url: String,
    pub remote_repo: String,
    pub forked_repo: String,
    /// Glob patterns over dependency names that are never upgraded.
    pub ignore: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lookup_workers: 8,
            upgrade_workers: 1,
            maximum_dependencies: 1000,
            repo_path: PathBuf::from(".repo"),
            manifest_glob: "**/ivy.xml".to_string(),
            main_branch: "master".to_string(),
            pulls_per_page: 25,
            http_retry_attempts: 3,
            http_retry_backoff_ms: 500,
            maven_search_url: DEFAULT_MAVEN_SEARCH_URL.to_string(),
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            remote_repo: DEFAULT_REMOTE_REPO.to_string(),
            forked_repo: DEFAULT_FORKED_REPO.to_string(),
            ignore: Vec::new(),
        }
    }
}

impl Settings {
    /// Load from `path`, or from `fireant.toml` in the working directory when
    /// present, then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    pub fn load_with<F>(path: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        if let Some(remote) = env(ENV_REMOTE_REPO) {
            settings.remote_repo = remote;
        }
        if let Some(forked) = env(ENV_FORKED_REPO) {
            settings.forked_repo = forked;
        }

        settings.validate()?;
        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            FireantError::config(format!("Cannot read '{}': {e}", path.display()))
        })?;
        Ok(toml::from_str(&content)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lookup_workers == 0 || self.upgrade_workers == 0 {
            return Err(FireantError::config("worker counts must be at least 1"));
        }
        if self.maximum_dependencies == 0 {
            return Err(FireantError::config(
                "maximum_dependencies must be at least 1",
            ));
        }
        if self.pulls_per_page == 0 || self.pulls_per_page > 100 {
            return Err(FireantError::config(
                "pulls_per_page must be between 1 and 100",
            ));
        }
        if !self.maven_search_url.contains("{group}")
            || !self.maven_search_url.contains("{artifact}")
        {
            return Err(FireantError::config(
                "maven_search_url needs {group} and {artifact} placeholders",
            ));
        }
        validate_service_url(&self.maven_search_url)?;
        validate_service_url(&self.github_api_url)?;
        self.remote_slug()?;
        self.forked_slug()?;
        Ok(())
    }

    pub fn remote_slug(&self) -> Result<RepoSlug> {
        RepoSlug::parse(&self.remote_repo)
    }

    pub fn forked_slug(&self) -> Result<RepoSlug> {
        RepoSlug::parse(&self.forked_repo)
    }
}

/// Source-host account used for commits and API calls.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            env(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| FireantError::config(format!("{key} is not set")))
        };

        Ok(Self {
            username: required(ENV_GITHUB_USERNAME)?,
            password: required(ENV_GITHUB_PASSWORD)?,
            email: required(ENV_GITHUB_EMAIL)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("email", &self.email)
            .finish()
    }
}

/// `owner/name` of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    pub fn parse(link: &str) -> Result<Self> {
        validate_service_url(link)?;
        let url = Url::parse(link)
            .map_err(|_| FireantError::config(format!("Invalid repository URL: {link}")))?;

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            [owner, name] => Ok(Self {
                owner: owner.to_string(),
                name: name.trim_end_matches(".git").to_string(),
            }),
            _ => Err(FireantError::config(format!(
                "Repository URL must look like https://host/owner/name: {link}"
            ))),
        }
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Reject anything but http(s) URLs pointing at public hosts.
pub fn validate_service_url(url: &str) -> Result<()> {
    let parsed =
        Url::parse(url).map_err(|_| FireantError::config(format!("Invalid URL: {url}")))?;

    match parsed.scheme() {
        "https" | "http" => {}
        scheme => {
            return Err(FireantError::config(format!(
                "Unsupported URL scheme: {scheme}"
            )));
        }
    }

    match parsed.host_str() {
        Some(host) if is_private_host(host) => Err(FireantError::config(format!(
            "Host '{host}' is not allowed"
        ))),
        Some(_) => Ok(()),
        None => Err(FireantError::config(format!("URL has no host: {url}"))),
    }
}

fn is_private_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }

    let host = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = host.parse::<IpAddr>() {
        match ip {
            IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
            IpAddr::V6(v6) => v6.is_loopback() || v6.is_unique_local(),
        }
    } else {
        false
    }
}
