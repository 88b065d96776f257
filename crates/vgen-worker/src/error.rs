//! Worker error types.

use std::path::PathBuf;
use thiserror::Error;
use vgen_client::GenerationError;
use vgen_storage::StorageError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to read job file {path}: {source}")]
    ReadJob {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid job file: {0}")]
    ParseJob(#[from] serde_json::Error),

    #[error("Failed to load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl WorkerError {
    pub fn invalid_job(msg: impl Into<String>) -> Self {
        Self::InvalidJob(msg.into())
    }
}
