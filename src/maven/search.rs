use crate::config::validate_service_url;
use crate::error::{FireantError, Result};
use crate::ivy::Identity;
use crate::maven::version::VersionComparator;
use crate::repository::VersionLookup;
use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::io::Read;
use std::time::Duration;
use url::form_urlencoded::byte_serialize;

const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

/// Client for the Maven Central solr search endpoint.
///
/// The URL template carries `{group}` and `{artifact}` placeholders; the
/// response lists candidate versions most relevant first.
pub struct MavenSearchClient {
    client: Client,
    url_template: String,
}

impl MavenSearchClient {
    pub fn new(url_template: impl Into<String>) -> Result<Self> {
        let url_template = url_template.into();
        validate_service_url(&url_template)?;
        Ok(Self {
            client: Self::build_client()?,
            url_template,
        })
    }

    fn build_client() -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("fireant")
            .danger_accept_invalid_certs(false)
            .build()
            .map_err(|e| FireantError::Registry(format!("Cannot build HTTP client: {e}")))
    }

    fn query_url(&self, identity: &Identity) -> String {
        let group: String = byte_serialize(identity.organization.as_bytes()).collect();
        let artifact: String = byte_serialize(identity.name.as_bytes()).collect();
        self.url_template
            .replace("{group}", &group)
            .replace("{artifact}", &artifact)
    }

    /// Every version the search service returned, in its order.
    pub fn fetch_candidates(&self, identity: &Identity) -> Result<Vec<String>> {
        let url = self.query_url(identity);
        debug!("Fetching: {url}");

        let response = self.client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FireantError::Registry(format!(
                "HTTP {status} for {identity}"
            )));
        }

        if response
            .content_length()
            .is_some_and(|len| len > MAX_RESPONSE_BYTES as u64)
        {
            return Err(oversized_response());
        }

        let text = read_limited(response, MAX_RESPONSE_BYTES)?;
        parse_candidates(&text)
    }
}

impl VersionLookup for MavenSearchClient {
    fn latest_stable_version(&self, identity: &Identity) -> Result<String> {
        let candidates = self.fetch_candidates(identity)?;
        select_stable(identity, &candidates)
    }
}

/// Read at most `limit` bytes of a body; anything longer is an error.
fn read_limited<R: Read>(body: R, limit: usize) -> Result<String> {
    let mut text = String::new();
    body.take(limit as u64 + 1)
        .read_to_string(&mut text)
        .map_err(|e| FireantError::Registry(format!("Failed to read search response: {e}")))?;
    if text.len() > limit {
        return Err(oversized_response());
    }
    Ok(text)
}

fn oversized_response() -> FireantError {
    FireantError::Registry("Search response exceeded 10MB limit".to_string())
}

fn select_stable(identity: &Identity, candidates: &[String]) -> Result<String> {
    VersionComparator::first_stable(candidates)
        .map(str::to_string)
        .ok_or_else(|| FireantError::NoStableVersion(identity.to_string()))
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    response: SearchBody,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    v: String,
}

pub fn parse_candidates(body: &str) -> Result<Vec<String>> {
    let parsed: SearchResponse = serde_json::from_str(body)?;
    Ok(parsed.response.docs.into_iter().map(|doc| doc.v).collect())
}
