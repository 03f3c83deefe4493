use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FireantError {
    #[error("Failed to parse '{path}': {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Manifest not found: {0}")]
    NotFound(PathBuf),

    #[error("Record index {index} out of range (manifest has {len} records)")]
    Index { index: usize, len: usize },

    #[error("Registry request failed: {0}")]
    Registry(String),

    #[error("No stable version found for {0}")]
    NoStableVersion(String),

    #[error("Forge operation failed: {0}")]
    Forge(String),

    #[error("Branch '{0}' already exists")]
    BranchExists(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Git operation failed: {0}")]
    GitOperation(String),

    #[error("Project validation failed: {0}")]
    ProjectValidation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FireantError {
    pub fn parse(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn forge(msg: impl Into<String>) -> Self {
        Self::Forge(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether a failed lookup is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Registry(_) | Self::NoStableVersion(_))
    }
}

impl From<reqwest::Error> for FireantError {
    fn from(err: reqwest::Error) -> Self {
        Self::Registry(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FireantError>;
