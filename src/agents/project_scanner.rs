use crate::error::{FireantError, Result};
use crate::utils::PathValidator;
use log::warn;
use std::path::{Path, PathBuf};

/// ProjectScannerAgent finds the Ivy manifests of a working copy.
pub struct ProjectScannerAgent {
    repo_path: PathBuf,
}

impl ProjectScannerAgent {
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Result<Self> {
        let repo_path = PathValidator::validate_project_path(repo_path)?;
        Ok(Self { repo_path })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Every file under the working copy matching `pattern`, sorted.
    pub fn discover(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let full_pattern = self.repo_path.join(pattern);
        let full_pattern = full_pattern.to_string_lossy();

        let entries = glob::glob(&full_pattern).map_err(|e| {
            FireantError::ProjectValidation(format!("Invalid manifest pattern '{pattern}': {e}"))
        })?;

        let mut manifests = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => manifests.push(path),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable path: {e}"),
            }
        }

        manifests.sort();
        Ok(manifests)
    }
}
