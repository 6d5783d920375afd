use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed task file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no task with id {0}")]
    NotFound(String),
    #[error("task title must not be empty")]
    InvalidTitle,
    #[error("a task with id {0} already exists")]
    DuplicateId(String),
}

/// The advisory service could not produce a usable ordering.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("advisor request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("advisor returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unparseable advisor response: {0}")]
    Parse(String),
}

/// The host could not show a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifications unavailable")]
    Unavailable,
    #[error("notification failed: {0}")]
    Failed(String),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
