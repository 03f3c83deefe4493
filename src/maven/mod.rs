pub mod search;
pub mod version;

pub use search::MavenSearchClient;
pub use version::VersionComparator;
