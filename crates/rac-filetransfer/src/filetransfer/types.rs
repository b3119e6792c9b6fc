//! Panel, listing entry and request/reply types for the file manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ─── Panels ──────────────────────────────────────────────────────────

/// Which side of the file manager a request or reply belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PanelType {
    Local,
    Remote,
}

impl PanelType {
    pub fn opposite(self) -> Self {
        match self {
            Self::Local => Self::Remote,
            Self::Remote => Self::Local,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

// ─── Listing Entries ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DriveKind {
    Unknown,
    Cdrom,
    Removable,
    Fixed,
    Network,
    Ram,
    HomeFolder,
    DesktopFolder,
}

impl Default for DriveKind {
    fn default() -> Self { Self::Unknown }
}

/// One root the user can browse from: a drive letter, a mount point, or a
/// well-known folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveEntry {
    pub path: String,
    #[serde(default)]
    pub kind: DriveKind,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_directory: bool,
}

impl FileEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self { name: name.into(), size, modified: None, is_directory: false }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self { name: name.into(), size: 0, modified: None, is_directory: true }
    }
}

/// Directories first, then by name ignoring case. Ties fall back to the
/// exact name so the order is total.
pub fn sort_directory_items(items: &mut [FileEntry]) {
    items.sort_by(|a, b| match (a.is_directory, b.is_directory) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
    });
}

// ─── Requests / Replies ──────────────────────────────────────────────

/// Issued by a panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FileRequest {
    DriveList { panel: PanelType },
    DirectoryList { panel: PanelType, path: String },
    /// Copy a local path to the remote side.
    SendFile { from: String, to: String },
    /// Copy a remote path to the local side.
    ReceiveFile { from: String, to: String },
}

impl FileRequest {
    /// Panel whose view changes once the request completes.
    pub fn target_panel(&self) -> PanelType {
        match self {
            Self::DriveList { panel } | Self::DirectoryList { panel, .. } => *panel,
            Self::SendFile { .. } => PanelType::Remote,
            Self::ReceiveFile { .. } => PanelType::Local,
        }
    }
}

/// Produced by the worker for exactly one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FileReply {
    DriveList { panel: PanelType, drives: Vec<DriveEntry> },
    DirectoryList { panel: PanelType, path: String, items: Vec<FileEntry> },
    TransferComplete { from: String, to: String },
    Failed { panel: PanelType, path: String, error: String },
}

impl FileReply {
    pub fn failed(request: &FileRequest, error: impl Into<String>) -> Self {
        let path = match request {
            FileRequest::DriveList { .. } => String::new(),
            FileRequest::DirectoryList { path, .. } => path.clone(),
            FileRequest::SendFile { from, .. } | FileRequest::ReceiveFile { from, .. } => from.clone(),
        };
        Self::Failed { panel: request.target_panel(), path, error: error.into() }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
