//! # rac-filetransfer: File Transfer Panel Boundary
//!
//! The two-panel file manager (local on one side, remote on the other) talks
//! to whatever moves the bytes through plain request and reply values:
//! - drive list and directory list requests, per panel
//! - send (local → remote) and receive (remote → local) of a single path
//!
//! `bridge` pairs the UI side with a worker over bounded tokio channels.

pub mod types;
pub mod error;
pub mod bridge;

pub use types::*;
pub use error::{FileTransferError, FileTransferResult};
pub use bridge::{FileTransferBridge, FileTransferWorker};
