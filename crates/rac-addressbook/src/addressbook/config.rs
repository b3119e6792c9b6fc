//! Tunables for saving and loading address books.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{AddressBookError, AddressBookResult};
use super::types::EncryptionMode;

/// Upper bound for either padding length.
pub const MAX_PADDING_LEN: usize = 64 * 1024;

fn default_kdf_rounds() -> u32 { 100_000 }
fn default_padding_len() -> usize { 4095 }
fn default_max_depth() -> usize { 64 }
fn default_max_nodes() -> usize { 1_000_000 }
fn default_max_kdf_rounds() -> u32 { 50_000_000 }

/// Random padding placed around the serialized tree on every save.
/// Each length is drawn uniformly from `0..=max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaddingPolicy {
    #[serde(default = "default_padding_len")]
    pub max_prefix_len: usize,
    #[serde(default = "default_padding_len")]
    pub max_suffix_len: usize,
}

impl Default for PaddingPolicy {
    fn default() -> Self {
        Self {
            max_prefix_len: default_padding_len(),
            max_suffix_len: default_padding_len(),
        }
    }
}

impl PaddingPolicy {
    /// No padding at all.
    pub fn none() -> Self {
        Self { max_prefix_len: 0, max_suffix_len: 0 }
    }

    pub fn validate(&self) -> AddressBookResult<()> {
        if self.max_prefix_len > MAX_PADDING_LEN || self.max_suffix_len > MAX_PADDING_LEN {
            return Err(AddressBookError::invalid_config(format!(
                "Padding lengths must not exceed {} bytes",
                MAX_PADDING_LEN
            )));
        }
        Ok(())
    }
}

/// Guards applied while decoding untrusted bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeLimits {
    /// Maximum group nesting depth; the root group is depth 0.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Maximum number of groups plus profiles.
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    /// Highest stored KDF round count accepted on load.
    #[serde(default = "default_max_kdf_rounds")]
    pub max_kdf_rounds: u32,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_nodes: default_max_nodes(),
            max_kdf_rounds: default_max_kdf_rounds(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressBookConfig {
    #[serde(default)]
    pub encryption_mode: EncryptionMode,
    #[serde(default = "default_kdf_rounds")]
    pub kdf_rounds: u32,
    #[serde(default)]
    pub padding: PaddingPolicy,
    #[serde(default)]
    pub limits: DecodeLimits,
}

impl Default for AddressBookConfig {
    fn default() -> Self {
        Self {
            encryption_mode: EncryptionMode::default(),
            kdf_rounds: default_kdf_rounds(),
            padding: PaddingPolicy::default(),
            limits: DecodeLimits::default(),
        }
    }
}

impl AddressBookConfig {
    /// Parse a JSON config document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> AddressBookResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> AddressBookResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn validate(&self) -> AddressBookResult<()> {
        if self.kdf_rounds == 0 {
            return Err(AddressBookError::invalid_config("kdfRounds must be at least 1"));
        }
        if self.kdf_rounds > self.limits.max_kdf_rounds {
            return Err(AddressBookError::invalid_config(
                "kdfRounds exceeds limits.maxKdfRounds; saved files could not be reopened",
            ));
        }
        self.padding.validate()?;
        if self.limits.max_depth == 0 {
            return Err(AddressBookError::invalid_config("limits.maxDepth must be at least 1"));
        }
        if self.limits.max_nodes == 0 {
            return Err(AddressBookError::invalid_config("limits.maxNodes must be at least 1"));
        }
        Ok(())
    }
}
