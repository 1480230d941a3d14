use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};

use tracing::debug;
use zeroize::Zeroizing;

use crate::config::StoreOptions;
use crate::crypto::{self, KdfParams};
use crate::document::Document;
use crate::error::StoreError;

/// An unlocked store: the decrypted document plus what is needed to seal it
/// again. Every write re-derives the key with a fresh salt and nonce.
///
/// A loaded store never seals at a lower cost than the envelope it was read
/// from: `kdf` is the component-wise maximum of the recorded parameters and
/// the configured ones.
pub struct Store {
    document: Document,
    passphrase: Zeroizing<String>,
    options: StoreOptions,
    kdf: KdfParams,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.document.name())
            .field("items", &self.document.len())
            .field("passphrase", &"<redacted>")
            .field("options", &self.options)
            .field("kdf", &self.kdf)
            .finish()
    }
}

impl Store {
    pub fn create<W: Write>(writer: W, name: &str, passphrase: &str) -> Result<Self, StoreError> {
        Self::create_with(writer, name, passphrase, StoreOptions::default())
    }

    /// Build a fresh, empty document and write its envelope to `writer`.
    pub fn create_with<W: Write>(
        writer: W,
        name: &str,
        passphrase: &str,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let store = Self {
            document: Document::new(name)?,
            passphrase: Zeroizing::new(passphrase.to_string()),
            options,
            kdf: options.kdf,
        };
        store.save(writer)?;
        debug!(store = name, "created store");
        Ok(store)
    }

    pub fn load<R: Read>(reader: R, passphrase: &str) -> Result<Self, StoreError> {
        Self::load_with(reader, passphrase, StoreOptions::default())
    }

    pub fn load_with<R: Read>(
        mut reader: R,
        passphrase: &str,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let mut envelope = Vec::new();
        reader.read_to_end(&mut envelope)?;
        let plaintext = crypto::decrypt(&envelope, passphrase.as_bytes())?;
        let document = Document::from_json(&plaintext)?;
        let recorded = crypto::inspect(&envelope)?.kdf;
        let kdf = options.kdf.max(recorded);
        if kdf != options.kdf {
            debug!(?recorded, configured = ?options.kdf, "keeping stronger recorded kdf params");
        }
        debug!(
            store = document.name(),
            items = document.len(),
            "loaded store"
        );
        Ok(Self {
            document,
            passphrase: Zeroizing::new(passphrase.to_string()),
            options,
            kdf,
        })
    }

    /// Serialise and encrypt the whole document without doing any I/O.
    pub fn seal(&self) -> Result<Vec<u8>, StoreError> {
        let plaintext = self.document.to_json()?;
        let envelope =
            crypto::encrypt_with(&plaintext, self.passphrase.as_bytes(), &self.kdf)?;
        Ok(envelope)
    }

    pub fn save<W: Write>(&self, mut writer: W) -> Result<(), StoreError> {
        let envelope = self.seal()?;
        writer.write_all(&envelope)?;
        writer.flush()?;
        debug!(store = self.name(), bytes = envelope.len(), "saved store");
        Ok(())
    }

    pub fn name(&self) -> &str {
        self.document.name()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Parameters the next write will seal with.
    pub fn kdf(&self) -> KdfParams {
        self.kdf
    }

    pub fn create_key(&mut self, key: &str, value: impl Into<String>) -> Result<(), StoreError> {
        self.document.create(key, value)
    }

    pub fn get_key(&self, key: &str) -> Result<&str, StoreError> {
        self.document.get(key)
    }

    pub fn update_key(&mut self, key: &str, value: impl Into<String>) -> Result<(), StoreError> {
        self.document.update(key, value)
    }

    pub fn delete_key(&mut self, key: &str) -> Result<(), StoreError> {
        self.document.delete(key)
    }

    pub fn replace_all(&mut self, data: BTreeMap<String, String>) {
        self.document.replace_all(data)
    }

    pub fn all_entries(&self) -> BTreeMap<String, String> {
        self.document.all_entries()
    }

    pub(crate) fn restore(&mut self, document: Document) {
        self.document = document;
    }
}
