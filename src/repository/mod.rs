use crate::error::Result;
use crate::ivy::Identity;

pub mod factory;
pub use factory::RepositoryFactory;

/// Source of "latest stable release" answers for a dependency identity.
pub trait VersionLookup: Send + Sync {
    /// Fails with `Registry` on transport or status errors and with
    /// `NoStableVersion` when the registry has nothing usable.
    fn latest_stable_version(&self, identity: &Identity) -> Result<String>;
}
