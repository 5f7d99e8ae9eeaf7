//! Error types for dify-upload.
//!
//! Each concern gets its own enum. The orchestrator decides which of them are
//! fatal: [`UploadError`] only ever carries the Init and Scanning stage
//! failures, everything that goes wrong for a single file is recorded in the
//! run report instead.

use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to the remote dataset API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The service answered with a non-2xx status.
    #[error("remote service returned {status}: {body}")]
    Remote { status: u16, body: String },

    /// The request was rejected locally before it was sent.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// HTTP status of a [`ApiError::Remote`] failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("directory not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot access {}: {source}", path.display())]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("failed to enumerate {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("invalid exclude pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API token is required. Provide it via --token or the DIFY_API_TOKEN environment variable")]
    MissingToken,

    #[error("invalid base URL {url:?}: must start with http:// or https://")]
    InvalidBaseUrl { url: String },

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config YAML {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Fatal outcomes of an upload run.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to create dataset: {0}")]
    CreateDataset(#[source] ApiError),

    #[error("failed to scan directory: {0}")]
    Scan(#[from] ScanError),
}

/// Failures of prefix cleanup. Deletions run one at a time, so a failed
/// deletion still reports every dataset removed before it.
#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("cleanup prefix must not be empty")]
    EmptyPrefix,

    #[error("failed to list datasets: {0}")]
    List(#[source] ApiError),

    #[error(
        "failed to delete dataset {id} after deleting {} ({}): {source}",
        deleted.len(),
        deleted.join(", ")
    )]
    Delete {
        id: String,
        /// Ids removed before the failure.
        deleted: Vec<String>,
        #[source]
        source: ApiError,
    },
}
