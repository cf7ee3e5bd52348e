//! Error types surfaced by the log store.

use std::path::PathBuf;

pub type Result<T, E = LogStoreError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum LogStoreError {
    #[error("address {0} already written")]
    Overwrite(u64),

    #[error("address {0} is pending trim")]
    Trimmed(u64),

    #[error("data corruption in {path}: {reason}")]
    DataCorruption { path: PathBuf, reason: String },

    #[error("segment {path} has version {found}, expected {expected}")]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("segment {path} was written without checksums but verification is required")]
    NoChecksum { path: PathBuf },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record: {0}")]
    Codec(String),
}

impl LogStoreError {
    pub fn corruption(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DataCorruption {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
