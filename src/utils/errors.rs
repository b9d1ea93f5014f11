//! Error types for the backup pipeline.

use crate::storage::UploadStep;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("No records found, nothing was written")]
    NoRecords,

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Storage service error: {0}")]
    Storage(String),

    #[error("PDS error: {0}")]
    Pds(String),

    #[error("Upload failed during {step}: {message}")]
    Upload { step: UploadStep, message: String },

    #[error("Aborted by user")]
    Aborted,
}

impl BackupError {
    /// Tag an error with the upload step it occurred in. `Aborted` passes
    /// through untouched so prompt cancellation stays distinguishable from
    /// a remote failure.
    pub fn at_step(self, step: UploadStep) -> Self {
        match self {
            BackupError::Aborted => BackupError::Aborted,
            other => BackupError::Upload {
                step,
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
