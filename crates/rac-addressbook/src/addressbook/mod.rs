//! # rac-addressbook: Encrypted Address Book Container
//!
//! Persistent catalog of remote-machine connection profiles:
//! - **Tree model**: arena of groups and profiles addressed by stable ids
//! - **Canonical serializer**: deterministic tag/length framing with random padding
//! - **Key derivation**: iterated SHA-256 over passphrase and salt
//! - **Authenticated cipher**: XChaCha20-Poly1305 with a random 192-bit nonce
//! - **Container codec**: header (mode, rounds, salt) plus one opaque blob
//!
//! Architecture:
//! - `types`: connection profile, group and session configuration model
//! - `error`: address book error taxonomy
//! - `config`: tunables (KDF rounds, padding, decode limits)
//! - `tree`: arena-backed `AddressBook` with move/reorder/traversal
//! - `wire`: low-level varint / length-delimited reader and writer
//! - `serializer`: tree ↔ bytes, padding wrap/unwrap
//! - `kdf`: passphrase stretching
//! - `cipher`: AEAD seal/open
//! - `container`: save/load/inspect of the full container
//! - `store`: atomic file persistence behind an async handle

pub mod types;
pub mod error;
pub mod config;
pub mod tree;
pub mod wire;
pub mod serializer;
pub mod kdf;
pub mod cipher;
pub mod container;
pub mod store;

// Re-exports
pub use types::*;
pub use error::{AddressBookError, AddressBookResult};
pub use config::{AddressBookConfig, DecodeLimits, PaddingPolicy, MAX_PADDING_LEN};
pub use tree::{AddressBook, GroupId, ProfileId, TreeItem};
pub use container::{inspect, load, save, ContainerInfo, SaveOptions};
pub use store::{AddressBookStore, AddressBookStoreState};
