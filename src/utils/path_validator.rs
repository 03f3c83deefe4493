use crate::error::{FireantError, Result};
use std::path::{Component, Path, PathBuf};

/// Path checks applied before handing paths to git or the contents API.
pub struct PathValidator;

impl PathValidator {
    /// Validates and canonicalises a working-copy directory.
    pub fn validate_project_path(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let canonical = path.canonicalize().map_err(|e| {
            FireantError::ProjectValidation(format!("Invalid path '{}': {e}", path.display()))
        })?;

        if !canonical.is_dir() {
            return Err(FireantError::ProjectValidation(format!(
                "Path '{}' is not a directory",
                canonical.display()
            )));
        }

        const FORBIDDEN: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

        for forbidden in FORBIDDEN {
            let forbidden_path = Path::new(forbidden);
            let blocked = path.starts_with(forbidden_path)
                || canonical.starts_with(forbidden_path)
                || forbidden_path
                    .canonicalize()
                    .is_ok_and(|resolved| canonical.starts_with(resolved));

            if blocked {
                return Err(FireantError::ProjectValidation(format!(
                    "Access to system directory '{forbidden}' is not allowed"
                )));
            }
        }

        Ok(canonical)
    }

    /// Ensures the file path resides inside the provided base directory.
    pub fn validate_file_path(
        file_path: impl AsRef<Path>,
        base_dir: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let file_path = file_path.as_ref();
        let base_dir = base_dir.as_ref();

        let canonical_file = file_path.canonicalize().map_err(|e| {
            FireantError::ProjectValidation(format!(
                "Invalid file path '{}': {e}",
                file_path.display()
            ))
        })?;

        let canonical_base = base_dir.canonicalize().map_err(|e| {
            FireantError::ProjectValidation(format!(
                "Invalid base directory '{}': {e}",
                base_dir.display()
            ))
        })?;

        if !canonical_file.starts_with(&canonical_base) {
            return Err(FireantError::ProjectValidation(
                "File path is outside the allowed directory".to_string(),
            ));
        }

        Ok(canonical_file)
    }

    /// Repository-relative path of `file_path` with `/` separators.
    pub fn git_path(file_path: impl AsRef<Path>, repo_root: impl AsRef<Path>) -> Result<String> {
        let canonical_file = Self::validate_file_path(file_path, &repo_root)?;
        let canonical_root = repo_root.as_ref().canonicalize()?;
        let relative = canonical_file
            .strip_prefix(&canonical_root)
            .map_err(|_| {
                FireantError::ProjectValidation(
                    "File path is outside the allowed directory".to_string(),
                )
            })?;

        let parts: Vec<String> = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        if parts.is_empty() {
            return Err(FireantError::ProjectValidation(format!(
                "'{}' is not a file inside the repository",
                canonical_file.display()
            )));
        }
        Ok(parts.join("/"))
    }
}
