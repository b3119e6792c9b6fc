//! Container codec, the outermost framing of an address book file.
//!
//! ```text
//! File:  1 encryption_type  2 hashing_rounds  3 hashing_salt  4 data  5 format_version
//! ```
//!
//! `data` is the padded payload verbatim for mode `None`, or
//! `nonce || ciphertext_with_tag` for encrypted modes. Every save produces a
//! complete new container; nothing is ever patched in place.

use serde::{Deserialize, Serialize};

use super::cipher::{self, SealedData};
use super::config::{DecodeLimits, PaddingPolicy};
use super::error::{AddressBookError, AddressBookResult};
use super::kdf;
use super::serializer;
use super::tree::AddressBook;
use super::types::EncryptionMode;
use super::wire::{WireReader, WireWriter};

pub const FORMAT_VERSION: u32 = 1;

mod file_field {
    pub const ENCRYPTION_TYPE: u32 = 1;
    pub const HASHING_ROUNDS: u32 = 2;
    pub const HASHING_SALT: u32 = 3;
    pub const DATA: u32 = 4;
    pub const FORMAT_VERSION: u32 = 5;
}

/// Inputs to [`save`].
#[derive(Clone, Copy)]
pub struct SaveOptions<'a> {
    pub mode: EncryptionMode,
    pub passphrase: Option<&'a str>,
    pub rounds: u32,
    pub padding: PaddingPolicy,
    /// Trees that the loader would reject are refused at save time.
    pub limits: DecodeLimits,
}

impl<'a> SaveOptions<'a> {
    pub fn unencrypted() -> Self {
        Self {
            mode: EncryptionMode::None,
            passphrase: None,
            rounds: 0,
            padding: PaddingPolicy::default(),
            limits: DecodeLimits::default(),
        }
    }

    pub fn encrypted(passphrase: &'a str, rounds: u32) -> Self {
        Self {
            mode: EncryptionMode::XChaCha20Poly1305,
            passphrase: Some(passphrase),
            rounds,
            padding: PaddingPolicy::default(),
            limits: DecodeLimits::default(),
        }
    }
}

impl std::fmt::Debug for SaveOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveOptions")
            .field("mode", &self.mode)
            .field("passphrase", &self.passphrase.map(|_| "***"))
            .field("rounds", &self.rounds)
            .field("padding", &self.padding)
            .field("limits", &self.limits)
            .finish()
    }
}

/// Header facts readable without a passphrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    pub format_version: u32,
    pub mode: EncryptionMode,
    pub hashing_rounds: u32,
    pub salt_len: usize,
    pub data_len: usize,
}

/// Parsed but not yet opened container.
struct RawContainer<'a> {
    format_version: u32,
    mode: EncryptionMode,
    rounds: u32,
    salt: &'a [u8],
    data: &'a [u8],
}

fn parse_container(bytes: &[u8]) -> AddressBookResult<RawContainer<'_>> {
    let mut mode_raw: u64 = 0;
    let mut rounds = 0;
    let mut salt: &[u8] = &[];
    let mut data = None;
    let mut format_version = FORMAT_VERSION;

    let mut r = WireReader::new(bytes);
    while let Some((field, value)) = r.next_field()? {
        match field {
            file_field::ENCRYPTION_TYPE => mode_raw = value.as_u64("file.encryption_type")?,
            file_field::HASHING_ROUNDS => rounds = value.as_u32("file.hashing_rounds")?,
            file_field::HASHING_SALT => salt = value.as_bytes("file.hashing_salt")?,
            file_field::DATA => data = Some(value.as_bytes("file.data")?),
            file_field::FORMAT_VERSION => format_version = value.as_u32("file.format_version")?,
            _ => {}
        }
    }

    if format_version != FORMAT_VERSION {
        return Err(AddressBookError::unsupported(format!(
            "Container format version {} is not supported",
            format_version
        )));
    }
    let mode = u32::try_from(mode_raw).ok().and_then(EncryptionMode::from_u32).ok_or_else(|| {
        AddressBookError::unsupported(format!("Unknown encryption mode {}", mode_raw))
    })?;
    let data = data.ok_or_else(|| AddressBookError::malformed("Container has no data"))?;

    Ok(RawContainer { format_version, mode, rounds, salt, data })
}

/// Serialize, pad, optionally encrypt, and frame the tree.
pub fn save(book: &AddressBook, options: &SaveOptions<'_>) -> AddressBookResult<Vec<u8>> {
    options.padding.validate()?;
    if book.depth() > options.limits.max_depth {
        return Err(AddressBookError::limit(format!(
            "Group nesting deeper than {}",
            options.limits.max_depth
        )));
    }
    if book.node_count() > options.limits.max_nodes {
        return Err(AddressBookError::limit(format!(
            "More than {} nodes in address book",
            options.limits.max_nodes
        )));
    }

    let (rounds, salt, data) = match options.mode {
        EncryptionMode::None => {
            let payload = serializer::encode_payload(book, &options.padding)?;
            (0, Vec::new(), payload)
        }
        EncryptionMode::XChaCha20Poly1305 => {
            let passphrase = match options.passphrase {
                Some(p) if !p.is_empty() => p,
                _ => {
                    return Err(AddressBookError::invalid_config(
                        "An encrypted address book needs a non-empty passphrase",
                    ))
                }
            };
            if options.rounds == 0 {
                return Err(AddressBookError::invalid_config("KDF rounds must be at least 1"));
            }
            if options.rounds > options.limits.max_kdf_rounds {
                return Err(AddressBookError::invalid_config(format!(
                    "KDF rounds above {} could not be reopened",
                    options.limits.max_kdf_rounds
                )));
            }

            let payload = serializer::encode_payload(book, &options.padding)?;
            let salt = kdf::generate_salt();
            let key = kdf::derive_key(passphrase, &salt, options.rounds)?;
            let sealed = cipher::seal(&key, &payload)?;
            (options.rounds, salt.to_vec(), sealed.to_blob())
        }
    };

    let mut w = WireWriter::with_capacity(data.len() + salt.len() + 32);
    w.write_u32(file_field::ENCRYPTION_TYPE, options.mode.as_u32());
    w.write_u32(file_field::HASHING_ROUNDS, rounds);
    w.write_bytes(file_field::HASHING_SALT, &salt);
    w.write_bytes(file_field::DATA, &data);
    w.write_u32(file_field::FORMAT_VERSION, FORMAT_VERSION);
    let bytes = w.into_vec();

    log::info!(
        "Saved address book: mode={}, rounds={}, nodes={}, size={} bytes",
        options.mode.as_str(),
        rounds,
        book.node_count(),
        bytes.len()
    );
    Ok(bytes)
}

/// Open a container. The passphrase is ignored for unencrypted containers.
pub fn load(
    bytes: &[u8],
    passphrase: Option<&str>,
    limits: &DecodeLimits,
) -> AddressBookResult<AddressBook> {
    let raw = parse_container(bytes).map_err(|e| {
        log::warn!("Rejected address book container: {}", e);
        e
    })?;

    let book = match raw.mode {
        EncryptionMode::None => serializer::decode_payload(raw.data, limits)?,
        EncryptionMode::XChaCha20Poly1305 => {
            let passphrase = match passphrase {
                Some(p) if !p.is_empty() => p,
                _ => return Err(AddressBookError::PassphraseRequired),
            };
            if raw.rounds == 0 {
                return Err(AddressBookError::malformed("Encrypted container with zero KDF rounds"));
            }
            if raw.rounds > limits.max_kdf_rounds {
                return Err(AddressBookError::limit(format!(
                    "Container asks for {} KDF rounds (limit {})",
                    raw.rounds, limits.max_kdf_rounds
                )));
            }
            if raw.salt.is_empty() {
                return Err(AddressBookError::malformed("Encrypted container without a salt"));
            }

            let sealed = SealedData::from_blob(raw.data)?;
            let key = kdf::derive_key(passphrase, raw.salt, raw.rounds)?;
            let payload = zeroize::Zeroizing::new(cipher::open(&key, &sealed.nonce, &sealed.ciphertext)?);
            serializer::decode_payload(&payload, limits)?
        }
    };

    log::info!(
        "Loaded address book: mode={}, version={}, nodes={}",
        raw.mode.as_str(),
        raw.format_version,
        book.node_count()
    );
    Ok(book)
}

/// Read the header only.
pub fn inspect(bytes: &[u8]) -> AddressBookResult<ContainerInfo> {
    let raw = parse_container(bytes)?;
    Ok(ContainerInfo {
        format_version: raw.format_version,
        mode: raw.mode,
        hashing_rounds: raw.rounds,
        salt_len: raw.salt.len(),
        data_len: raw.data.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressbook::types::{ConnectionProfile, ProfileGroup};

    fn book() -> AddressBook {
        let mut book = AddressBook::new("root");
        let root = book.root();
        let g = book.add_group(root, ProfileGroup::new("g")).unwrap();
        book.add_profile(g, ConnectionProfile::new("p", "h", 22).with_credentials("u", "pw"))
            .unwrap();
        book
    }

    fn limits() -> DecodeLimits {
        DecodeLimits::default()
    }

    #[test]
    fn unencrypted_roundtrip_ignores_passphrase() {
        let book = book();
        let bytes = save(&book, &SaveOptions::unencrypted()).unwrap();
        assert_eq!(load(&bytes, None, &limits()).unwrap(), book);
        assert_eq!(load(&bytes, Some("anything"), &limits()).unwrap(), book);
    }

    #[test]
    fn encrypted_roundtrip() {
        let book = book();
        let bytes = save(&book, &SaveOptions::encrypted("pw", 10)).unwrap();
        assert_eq!(load(&bytes, Some("pw"), &limits()).unwrap(), book);
    }

    #[test]
    fn encrypted_save_needs_passphrase_and_rounds() {
        let mut opts = SaveOptions::encrypted("", 10);
        assert!(matches!(
            save(&book(), &opts).unwrap_err(),
            AddressBookError::InvalidConfiguration(_)
        ));
        opts.passphrase = None;
        assert!(matches!(
            save(&book(), &opts).unwrap_err(),
            AddressBookError::InvalidConfiguration(_)
        ));
        let opts = SaveOptions::encrypted("pw", 0);
        assert!(matches!(
            save(&book(), &opts).unwrap_err(),
            AddressBookError::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn encrypted_load_without_passphrase() {
        let bytes = save(&book(), &SaveOptions::encrypted("pw", 3)).unwrap();
        assert_eq!(load(&bytes, None, &limits()).unwrap_err(), AddressBookError::PassphraseRequired);
        assert_eq!(load(&bytes, Some(""), &limits()).unwrap_err(), AddressBookError::PassphraseRequired);
    }

    #[test]
    fn wrong_passphrase_is_opaque() {
        let bytes = save(&book(), &SaveOptions::encrypted("pw", 3)).unwrap();
        assert_eq!(
            load(&bytes, Some("PW"), &limits()).unwrap_err(),
            AddressBookError::WrongPassphraseOrCorruptFile
        );
    }

    fn raw_file(mode: u32, rounds: u32, salt: &[u8], data: &[u8], version: Option<u32>) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.write_u32(file_field::ENCRYPTION_TYPE, mode);
        w.write_u32(file_field::HASHING_ROUNDS, rounds);
        w.write_bytes(file_field::HASHING_SALT, salt);
        w.write_bytes(file_field::DATA, data);
        if let Some(v) = version {
            w.write_u32(file_field::FORMAT_VERSION, v);
        }
        w.into_vec()
    }

    #[test]
    fn reserved_and_unknown_modes_rejected() {
        for mode in [0, 3, 255] {
            let err = load(&raw_file(mode, 0, &[], &[], None), None, &limits()).unwrap_err();
            assert!(matches!(err, AddressBookError::UnsupportedFormat(_)), "mode {}", mode);
        }
        // A missing mode field reads as the reserved 0.
        let mut w = WireWriter::new();
        w.write_bytes(file_field::DATA, &[]);
        let err = load(&w.into_vec(), None, &limits()).unwrap_err();
        assert!(matches!(err, AddressBookError::UnsupportedFormat(_)));
    }

    #[test]
    fn oversized_mode_is_unsupported() {
        for mode in [u32::MAX as u64 + 1, u64::MAX] {
            let mut w = WireWriter::new();
            w.write_u64(file_field::ENCRYPTION_TYPE, mode);
            w.write_bytes(file_field::DATA, &[]);
            let bytes = w.into_vec();
            let err = load(&bytes, None, &limits()).unwrap_err();
            assert!(matches!(err, AddressBookError::UnsupportedFormat(_)), "mode {}", mode);
            assert!(matches!(inspect(&bytes).unwrap_err(), AddressBookError::UnsupportedFormat(_)));
        }
    }

    #[test]
    fn oversized_padding_refused_at_save() {
        let mut opts = SaveOptions::unencrypted();
        opts.padding.max_suffix_len = usize::MAX;
        assert!(matches!(
            save(&book(), &opts).unwrap_err(),
            AddressBookError::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn unknown_version_rejected() {
        let err = load(&raw_file(1, 0, &[], &[], Some(2)), None, &limits()).unwrap_err();
        assert!(matches!(err, AddressBookError::UnsupportedFormat(_)));
    }

    #[test]
    fn missing_version_reads_as_current() {
        let book = book();
        let payload = serializer::encode_payload(&book, &PaddingPolicy::none()).unwrap();
        let bytes = raw_file(1, 0, &[], &payload, None);
        assert_eq!(load(&bytes, None, &limits()).unwrap(), book);
    }

    #[test]
    fn excessive_rounds_rejected_before_derivation() {
        let bytes = raw_file(2, u32::MAX, &[1; 32], &[0; 64], None);
        let err = load(&bytes, Some("pw"), &limits()).unwrap_err();
        assert!(matches!(err, AddressBookError::ResourceLimitExceeded(_)));
    }

    #[test]
    fn zero_rounds_or_empty_salt_in_encrypted_file() {
        let err = load(&raw_file(2, 0, &[1; 32], &[0; 64], None), Some("pw"), &limits()).unwrap_err();
        assert!(matches!(err, AddressBookError::MalformedPayload(_)));
        let err = load(&raw_file(2, 5, &[], &[0; 64], None), Some("pw"), &limits()).unwrap_err();
        assert!(matches!(err, AddressBookError::MalformedPayload(_)));
    }

    #[test]
    fn inspect_reads_header_only() {
        let bytes = save(&book(), &SaveOptions::encrypted("pw", 7)).unwrap();
        let info = inspect(&bytes).unwrap();
        assert_eq!(info.mode, EncryptionMode::XChaCha20Poly1305);
        assert_eq!(info.hashing_rounds, 7);
        assert_eq!(info.salt_len, kdf::SALT_SIZE);
        assert_eq!(info.format_version, FORMAT_VERSION);
        assert!(info.data_len >= cipher::NONCE_SIZE + cipher::TAG_SIZE);

        let plain = inspect(&save(&book(), &SaveOptions::unencrypted()).unwrap()).unwrap();
        assert_eq!(plain.mode, EncryptionMode::None);
        assert_eq!(plain.hashing_rounds, 0);
        assert_eq!(plain.salt_len, 0);
    }

    #[test]
    fn save_refuses_trees_the_loader_would_reject() {
        let mut deep = AddressBook::new("root");
        let mut parent = deep.root();
        for _ in 0..3 {
            parent = deep.add_group(parent, ProfileGroup::new("x")).unwrap();
        }
        let mut opts = SaveOptions::unencrypted();
        opts.limits.max_depth = 2;
        assert!(matches!(
            save(&deep, &opts).unwrap_err(),
            AddressBookError::ResourceLimitExceeded(_)
        ));
    }
}
