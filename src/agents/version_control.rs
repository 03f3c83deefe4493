use crate::error::{FireantError, Result};
use crate::utils::path_validator::PathValidator;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// VersionControlAgent keeps the local working copy of the fork current.
#[derive(Debug)]
pub struct VersionControlAgent {
    repo_path: PathBuf,
}

impl VersionControlAgent {
    /// Clone `link` into `repo_path` unless a working copy is already there.
    /// Returns `true` when a clone happened.
    pub fn clone_if_missing<P: AsRef<Path>>(link: &str, repo_path: P) -> Result<(Self, bool)> {
        let repo_path = repo_path.as_ref();
        if repo_path.is_dir() {
            return Ok((Self::new(repo_path)?, false));
        }

        Self::validate_argument(link)?;
        Self::validate_argument(&repo_path.to_string_lossy())?;

        let output = Command::new("git")
            .args(["clone", link])
            .arg(repo_path)
            .output()
            .map_err(|e| FireantError::GitOperation(format!("Failed to execute git clone: {e}")))?;
        Self::ensure_success(&output, "git clone")?;

        Ok((Self::new(repo_path)?, true))
    }

    pub fn new<P: AsRef<Path>>(repo_path: P) -> Result<Self> {
        let repo_path = Self::validate_git_path(repo_path.as_ref())?;
        Ok(Self { repo_path })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn pull(&self) -> Result<()> {
        let output = self.run_git(&["pull", "--ff-only"])?;
        Self::ensure_success(&output, "git pull")
    }

    /// Check if the working directory is clean
    pub fn is_working_directory_clean(&self) -> Result<bool> {
        let output = self.run_git(&["status", "--porcelain"])?;
        Self::ensure_success(&output, "git status")?;
        Ok(output.stdout.is_empty())
    }

    fn run_git(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .current_dir(&self.repo_path)
            .args(args)
            .output()
            .map_err(|e| {
                FireantError::GitOperation(format!(
                    "Failed to execute git command '{}': {e}",
                    args.join(" ")
                ))
            })
    }

    fn ensure_success(output: &Output, command: &str) -> Result<()> {
        if output.status.success() {
            return Ok(());
        }

        Err(FireantError::GitOperation(format!(
            "{} failed: {}",
            command,
            String::from_utf8_lossy(&output.stderr)
        )))
    }

    fn validate_argument(value: &str) -> Result<()> {
        let dangerous = [';', '|', '&', '$', '`', '\n', '\r'];
        if let Some(ch) = dangerous.iter().find(|c| value.contains(**c)) {
            return Err(FireantError::GitOperation(format!(
                "Argument contains dangerous character: '{ch}'"
            )));
        }
        if value.starts_with('-') {
            return Err(FireantError::GitOperation(format!(
                "Argument may not start with '-': {value}"
            )));
        }
        Ok(())
    }

    fn validate_git_path(path: &Path) -> Result<PathBuf> {
        Self::validate_argument(&path.to_string_lossy())?;
        PathValidator::validate_project_path(path)
            .map_err(|err| FireantError::GitOperation(format!("Invalid Git path: {err}")))
    }
}
