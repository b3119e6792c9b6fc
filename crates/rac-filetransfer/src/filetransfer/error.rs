//! File transfer bridge errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum FileTransferError {
    /// The other half of the bridge was dropped.
    #[error("File transfer peer disconnected")]
    Disconnected,
    #[error("Request rejected: {0}")]
    Rejected(String),
}

pub type FileTransferResult<T> = Result<T, FileTransferError>;

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for FileTransferError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self::Disconnected
    }
}
