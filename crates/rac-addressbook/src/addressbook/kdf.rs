//! Passphrase stretching.
//!
//! `state = passphrase`, then `rounds` times `state = SHA-256(state || salt)`.
//! The round count and salt are stored in the container header so the same
//! key can be rebuilt on load; the key itself is never stored.

use rand::Rng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::error::{AddressBookError, AddressBookResult};

pub const KEY_SIZE: usize = 32;
pub const SALT_SIZE: usize = 32;

/// Symmetric key wiped from memory on drop.
pub type DerivedKey = Zeroizing<[u8; KEY_SIZE]>;

/// Fresh random salt. Called once per encrypted save, never reused.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill(&mut salt);
    salt
}

/// Derive the container key. `rounds == 0` is a configuration error.
pub fn derive_key(passphrase: &str, salt: &[u8], rounds: u32) -> AddressBookResult<DerivedKey> {
    if rounds == 0 {
        return Err(AddressBookError::invalid_config("KDF rounds must be at least 1"));
    }

    let mut state: DerivedKey = Zeroizing::new([0u8; KEY_SIZE]);
    let mut hasher = Sha256::new();
    hasher.update(passphrase.as_bytes());
    hasher.update(salt);
    state.copy_from_slice(&hasher.finalize());

    for _ in 1..rounds {
        let mut hasher = Sha256::new();
        hasher.update(state.as_slice());
        hasher.update(salt);
        state.copy_from_slice(&hasher.finalize());
    }
    Ok(state)
}
