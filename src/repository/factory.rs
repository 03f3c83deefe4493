use crate::config::Settings;
use crate::error::Result;
use crate::maven::MavenSearchClient;
use crate::repository::VersionLookup;
use std::sync::Arc;

pub struct RepositoryFactory;

impl RepositoryFactory {
    pub fn create_maven_search(settings: &Settings) -> Result<Arc<dyn VersionLookup>> {
        let client = MavenSearchClient::new(&settings.maven_search_url)?;
        Ok(Arc::new(client))
    }
}
