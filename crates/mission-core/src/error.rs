use mission_model::ValidationError;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("failed to decode stored value under {key}: {reason}")]
    StorageDecode { key: String, reason: String },
    #[error("failed to write {key}: {reason}")]
    StorageWrite { key: String, reason: String },
    #[error("import failed: {0}")]
    ImportMalformed(String),
    #[error("invalid input: {0}")]
    Invalid(#[from] ValidationError),
    #[error("document store unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("document store rejected the write: {0}")]
    Store(#[from] StoreError),
    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("{0} is only available in local mode")]
    LocalOnly(&'static str),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
