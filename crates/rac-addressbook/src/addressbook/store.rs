//! # Address Book Store
//!
//! File-backed persistence for one address book.
//!
//! - Writes go to a temporary file in the target directory which is then
//!   renamed over the old file, so a crash never leaves a half-written book.
//! - Key derivation and sealing run on the blocking pool, off the async
//!   executor.
//! - The passphrase is held as a `SecretString` and never logged.
//!
//! ```rust,no_run
//! # async fn example() -> rac_addressbook::AddressBookResult<()> {
//! use rac_addressbook::{AddressBook, AddressBookConfig, AddressBookStore};
//!
//! let store = AddressBookStore::new("book.bin", AddressBookConfig::default());
//! store.lock().await.set_passphrase(Some("correct-horse".to_string()));
//!
//! let book = AddressBook::new("My Computers");
//! store.lock().await.save(&book).await?;
//! let loaded = store.lock().await.load().await?;
//! assert_eq!(loaded, Some(book));
//! # Ok(())
//! # }
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use zeroize::Zeroizing;

use super::config::AddressBookConfig;
use super::container::{self, SaveOptions};
use super::error::{AddressBookError, AddressBookResult};
use super::tree::AddressBook;
use super::types::EncryptionMode;

/// Shared handle to the store.
pub type AddressBookStoreState = Arc<Mutex<AddressBookStore>>;

pub struct AddressBookStore {
    store_path: PathBuf,
    passphrase: Option<SecretString>,
    config: AddressBookConfig,
}

/// `<data dir>/rac/address_book.bin`, if the platform has a data dir.
pub fn default_store_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("rac").join("address_book.bin"))
}

impl AddressBookStore {
    pub fn new(store_path: impl Into<PathBuf>, config: AddressBookConfig) -> AddressBookStoreState {
        Arc::new(Mutex::new(Self {
            store_path: store_path.into(),
            passphrase: None,
            config,
        }))
    }

    /// Store at [`default_store_path`].
    pub fn open_default(config: AddressBookConfig) -> AddressBookResult<AddressBookStoreState> {
        let path = default_store_path()
            .ok_or_else(|| AddressBookError::Io("No data directory on this platform".into()))?;
        Ok(Self::new(path, config))
    }

    pub fn path(&self) -> &Path {
        &self.store_path
    }

    pub fn config(&self) -> &AddressBookConfig {
        &self.config
    }

    /// Passphrase used for the next save and load. `None` or an empty
    /// string clears it.
    pub fn set_passphrase(&mut self, passphrase: Option<String>) {
        self.passphrase = passphrase.filter(|p| !p.is_empty()).map(SecretString::new);
    }

    pub fn set_encryption_mode(&mut self, mode: EncryptionMode) {
        self.config.encryption_mode = mode;
    }

    pub fn has_passphrase(&self) -> bool {
        self.passphrase.is_some()
    }

    pub async fn has_stored_data(&self) -> AddressBookResult<bool> {
        Ok(tokio::fs::try_exists(&self.store_path).await?)
    }

    /// Reads only the container header; no passphrase needed.
    pub async fn is_storage_encrypted(&self) -> AddressBookResult<bool> {
        if !self.has_stored_data().await? {
            return Ok(false);
        }
        let bytes = tokio::fs::read(&self.store_path).await?;
        let info = container::inspect(&bytes)?;
        Ok(info.mode.is_encrypted())
    }

    fn exposed_passphrase(&self) -> Option<Zeroizing<String>> {
        self.passphrase
            .as_ref()
            .map(|p| Zeroizing::new(p.expose_secret().clone()))
    }

    /// Encode, seal and atomically replace the stored file.
    pub async fn save(&self, book: &AddressBook) -> AddressBookResult<()> {
        let config = self.config.clone();
        let passphrase = self.exposed_passphrase();
        if config.encryption_mode.is_encrypted() && passphrase.is_none() {
            return Err(AddressBookError::invalid_config(
                "Set a passphrase before saving an encrypted address book",
            ));
        }

        let book = book.clone();
        let path = self.store_path.clone();
        tokio::task::spawn_blocking(move || {
            let options = SaveOptions {
                mode: config.encryption_mode,
                passphrase: passphrase.as_ref().map(|p| p.as_str()),
                rounds: config.kdf_rounds,
                padding: config.padding,
                limits: config.limits,
            };
            let bytes = container::save(&book, &options)?;
            write_atomically(&path, &bytes)
        })
        .await
        .map_err(|e| AddressBookError::Io(format!("Save task failed: {}", e)))??;

        log::info!("Address book written to {}", self.store_path.display());
        Ok(())
    }

    /// `Ok(None)` when nothing has been saved yet.
    pub async fn load(&self) -> AddressBookResult<Option<AddressBook>> {
        if !self.has_stored_data().await? {
            return Ok(None);
        }
        let bytes = tokio::fs::read(&self.store_path).await?;
        let passphrase = self.exposed_passphrase();
        let limits = self.config.limits;

        let book = tokio::task::spawn_blocking(move || {
            container::load(&bytes, passphrase.as_ref().map(|p| p.as_str()), &limits)
        })
        .await
        .map_err(|e| AddressBookError::Io(format!("Load task failed: {}", e)))??;
        Ok(Some(book))
    }

    pub async fn clear_storage(&self) -> AddressBookResult<()> {
        if self.has_stored_data().await? {
            tokio::fs::remove_file(&self.store_path).await?;
            log::info!("Address book removed from {}", self.store_path.display());
        }
        Ok(())
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> AddressBookResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressbook::types::{ConnectionProfile, ProfileGroup};
    use tempfile::TempDir;

    fn fast_config() -> AddressBookConfig {
        AddressBookConfig { kdf_rounds: 16, ..AddressBookConfig::default() }
    }

    fn sample() -> AddressBook {
        let mut book = AddressBook::new("My Computers");
        let root = book.root();
        let servers = book.add_group(root, ProfileGroup::new("Servers")).unwrap();
        book.add_profile(servers, ConnectionProfile::new("db1", "10.0.0.5", 22)).unwrap();
        book
    }

    #[tokio::test]
    async fn load_before_any_save_is_none() {
        let dir = TempDir::new().unwrap();
        let store = AddressBookStore::new(dir.path().join("book.bin"), fast_config());
        let store = store.lock().await;
        assert!(!store.has_stored_data().await.unwrap());
        assert!(!store.is_storage_encrypted().await.unwrap());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn encrypted_save_requires_passphrase() {
        let dir = TempDir::new().unwrap();
        let store = AddressBookStore::new(dir.path().join("book.bin"), fast_config());
        let err = store.lock().await.save(&sample()).await.unwrap_err();
        assert!(matches!(err, AddressBookError::InvalidConfiguration(_)));
        assert!(!store.lock().await.has_stored_data().await.unwrap());
    }

    #[tokio::test]
    async fn encrypted_roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let store = AddressBookStore::new(dir.path().join("nested/book.bin"), fast_config());
        let book = sample();

        let mut guard = store.lock().await;
        guard.set_passphrase(Some("pw".to_string()));
        guard.save(&book).await.unwrap();
        assert!(guard.is_storage_encrypted().await.unwrap());
        assert_eq!(guard.load().await.unwrap(), Some(book));

        guard.set_passphrase(None);
        assert_eq!(guard.load().await.unwrap_err(), AddressBookError::PassphraseRequired);
        guard.set_passphrase(Some("other".to_string()));
        assert_eq!(
            guard.load().await.unwrap_err(),
            AddressBookError::WrongPassphraseOrCorruptFile
        );
    }

    #[tokio::test]
    async fn plain_save_replaces_previous_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.bin");
        let store = AddressBookStore::new(&path, fast_config());
        let mut guard = store.lock().await;
        guard.set_encryption_mode(EncryptionMode::None);

        guard.save(&sample()).await.unwrap();
        let empty = AddressBook::new("empty");
        guard.save(&empty).await.unwrap();
        assert!(!guard.is_storage_encrypted().await.unwrap());
        assert_eq!(guard.load().await.unwrap(), Some(empty));

        // Only the final file remains; the temporary was renamed over it.
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn clear_storage_removes_file() {
        let dir = TempDir::new().unwrap();
        let store = AddressBookStore::new(dir.path().join("book.bin"), fast_config());
        let mut guard = store.lock().await;
        guard.set_encryption_mode(EncryptionMode::None);
        guard.save(&sample()).await.unwrap();
        assert!(guard.has_stored_data().await.unwrap());
        guard.clear_storage().await.unwrap();
        assert!(!guard.has_stored_data().await.unwrap());
        guard.clear_storage().await.unwrap();
    }

    #[test]
    fn empty_passphrase_clears() {
        let mut store = AddressBookStore {
            store_path: PathBuf::from("x"),
            passphrase: None,
            config: fast_config(),
        };
        store.set_passphrase(Some(String::new()));
        assert!(!store.has_passphrase());
        store.set_passphrase(Some("pw".into()));
        assert!(store.has_passphrase());
    }

    #[test]
    fn default_path_ends_with_book_file() {
        if let Some(path) = default_store_path() {
            assert!(path.ends_with("rac/address_book.bin"));
        }
    }
}
