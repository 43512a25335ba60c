//! Error types for zfstools operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ZfsToolsError>;

#[derive(Error, Debug)]
pub enum ZfsToolsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Empty snapshot name")]
    EmptySnapshotName,

    #[error("No dataset(s) specified")]
    NoDatasets,

    #[error("Invalid snapshot name: {name}")]
    InvalidSnapshotName { name: String },

    #[error("{failed} of {attempted} snapshot create operations failed")]
    SnapshotsFailed { failed: usize, attempted: usize },

    #[error("{failed} of {attempted} snapshot destroy operations failed")]
    DestroyFailed { failed: usize, attempted: usize },

    #[error("Command `{command}` failed with status {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("String conversion error: {0}")]
    StringConversion(#[from] std::string::FromUtf8Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl ZfsToolsError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    pub fn invalid_snapshot_name(name: impl Into<String>) -> Self {
        Self::InvalidSnapshotName { name: name.into() }
    }

    /// True for the aggregate "some operations failed" errors
    pub fn is_partial_failure(&self) -> bool {
        matches!(
            self,
            Self::SnapshotsFailed { .. } | Self::DestroyFailed { .. }
        )
    }
}
