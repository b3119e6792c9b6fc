//! Error types for the address book crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum AddressBookError {
    /// Structurally invalid serialized tree (truncated length, bad tag, bad value)
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    /// Unknown encryption mode or container version
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    /// Zero rounds, empty passphrase where one is required, bad tunables
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Encrypted container opened without a passphrase
    #[error("A passphrase is required to open this address book")]
    PassphraseRequired,
    /// AEAD tag check failed. The two causes are deliberately not told apart.
    #[error("Wrong passphrase or corrupt file")]
    WrongPassphraseOrCorruptFile,
    /// Depth, node count or KDF rounds guard tripped while decoding
    #[error("Resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),
    /// Stale id, bad position, or a move that would create a cycle
    #[error("Invalid tree operation: {0}")]
    InvalidTreeOperation(String),
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(String),
}

pub type AddressBookResult<T> = Result<T, AddressBookError>;

impl AddressBookError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn limit(msg: impl Into<String>) -> Self {
        Self::ResourceLimitExceeded(msg.into())
    }

    pub fn tree(msg: impl Into<String>) -> Self {
        Self::InvalidTreeOperation(msg.into())
    }
}

impl From<std::io::Error> for AddressBookError {
    fn from(e: std::io::Error) -> Self { Self::Io(e.to_string()) }
}

impl From<serde_json::Error> for AddressBookError {
    fn from(e: serde_json::Error) -> Self { Self::InvalidConfiguration(e.to_string()) }
}

impl From<tempfile::PersistError> for AddressBookError {
    fn from(e: tempfile::PersistError) -> Self { Self::Io(e.error.to_string()) }
}
