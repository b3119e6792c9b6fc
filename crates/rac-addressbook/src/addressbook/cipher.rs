//! XChaCha20-Poly1305 sealing of the padded payload.
//!
//! - 24-byte random nonce per seal (wide enough to pick at random)
//! - 16-byte Poly1305 tag appended to the ciphertext
//! - Blob layout stored in the container: `[nonce (24)] [ciphertext+tag]`

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::Rng;

use super::error::{AddressBookError, AddressBookResult};
use super::kdf::KEY_SIZE;

pub const NONCE_SIZE: usize = 24;
pub const TAG_SIZE: usize = 16;

/// Output of [`seal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedData {
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext with the authentication tag appended.
    pub ciphertext: Vec<u8>,
}

impl SealedData {
    /// `nonce || ciphertext_with_tag`
    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        blob.extend_from_slice(&self.nonce);
        blob.extend_from_slice(&self.ciphertext);
        blob
    }

    /// Split a stored blob. Anything too short to hold a nonce and a tag is
    /// reported exactly like a failed tag check.
    pub fn from_blob(blob: &[u8]) -> AddressBookResult<Self> {
        if blob.len() < NONCE_SIZE + TAG_SIZE {
            return Err(AddressBookError::WrongPassphraseOrCorruptFile);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        nonce_bytes.copy_from_slice(nonce);
        Ok(Self { nonce: nonce_bytes, ciphertext: ciphertext.to_vec() })
    }
}

fn cipher_for(key: &[u8; KEY_SIZE]) -> XChaCha20Poly1305 {
    XChaCha20Poly1305::new(key.into())
}

/// Encrypt under a freshly generated random nonce.
pub fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> AddressBookResult<SealedData> {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill(&mut nonce);

    let ciphertext = cipher_for(key)
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| AddressBookError::invalid_config("Payload too large to encrypt"))?;
    Ok(SealedData { nonce, ciphertext })
}

/// Verify and decrypt. Every failure is the same opaque error and no
/// plaintext is ever released for data that fails the tag check.
pub fn open(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
) -> AddressBookResult<Vec<u8>> {
    cipher_for(key)
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| AddressBookError::WrongPassphraseOrCorruptFile)
}
