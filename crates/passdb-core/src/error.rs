use std::path::PathBuf;

use thiserror::Error;

/// Failures of the key-derivation / envelope layer.
///
/// Every decryption failure is reported as [`CryptoError::CannotDecrypt`]: a
/// wrong passphrase and a corrupted envelope are indistinguishable to callers.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid password - must be at least {min} bytes", min = crate::crypto::MIN_PASSWORD_LEN)]
    InvalidPassword,

    #[error("input text provided is empty")]
    EmptyInputText,

    #[error("cannot decrypt the encrypted input with the password provided")]
    CannotDecrypt,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("encryption failed")]
    Encrypt,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store name cannot be empty")]
    EmptyStoreName,

    #[error("key provided is invalid")]
    InvalidKey,

    #[error("key already exists in store: {0}")]
    KeyAlreadyExists(String),

    #[error("key does not exist in store: {0}")]
    KeyDoesNotExist(String),

    #[error("no change made to value for key: {0}")]
    NoChangeMade(String),

    #[error("store decrypted but does not contain a valid document: {0}")]
    Corrupt(#[source] serde_json::Error),

    #[error("store decrypted but the document is invalid: {0}")]
    InvalidDocument(&'static str),

    #[error("unsupported store document version {0}")]
    UnsupportedVersion(u32),

    #[error("store document cannot be serialised: {0}")]
    Serialise(#[source] serde_json::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ItemError {
    #[error("no item name supplied")]
    NoNameSupplied,

    #[error("insufficient information provided to create an item")]
    InsufficientInformation,
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("file already exists: {}", .0.display())]
    FileAlreadyExists(PathBuf),

    #[error("item does not exist in the passdb: {0}")]
    ItemDoesNotExist(String),

    #[error("item was unchanged: {0}")]
    ItemUnchanged(String),

    #[error("item cannot be renamed to the name it already has")]
    RenameToSameName,

    #[error("cannot rename item - name already in use by another item: {0}")]
    ItemNameAlreadyInUse(String),

    #[error("item record is invalid: {0}")]
    Record(#[source] serde_json::Error),

    #[error(transparent)]
    Item(#[from] ItemError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("passdb I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CryptoError> for DbError {
    fn from(err: CryptoError) -> Self {
        DbError::Store(StoreError::Crypto(err))
    }
}
