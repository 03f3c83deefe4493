pub mod dependency_resolver;
pub mod project_scanner;
pub mod upgrade;
pub mod version_control;

pub use dependency_resolver::{DependencyResolver, UpdatePlan};
pub use project_scanner::ProjectScannerAgent;
pub use upgrade::{UpgradeAgent, UpgradeReport};
pub use version_control::VersionControlAgent;
