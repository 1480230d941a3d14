//! In-memory store document: name, version and the opaque item map.
//!
//! Nothing here touches disk; persistence lives in [`crate::store`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::StoreError;

pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    name: String,
    version: u32,
    #[serde(default)]
    data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_modified: Option<DateTime<Utc>>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("entries", &self.data.len())
            .finish()
    }
}

impl Document {
    pub fn new(name: &str) -> Result<Self, StoreError> {
        if name.is_empty() {
            return Err(StoreError::EmptyStoreName);
        }
        Ok(Self {
            name: name.to_string(),
            version: DOCUMENT_VERSION,
            data: BTreeMap::new(),
            last_modified: Some(Utc::now()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn create(&mut self, key: &str, value: impl Into<String>) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey);
        }
        if self.data.contains_key(key) {
            return Err(StoreError::KeyAlreadyExists(key.to_string()));
        }
        self.data.insert(key.to_string(), value.into());
        self.touch();
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<&str, StoreError> {
        self.data
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| StoreError::KeyDoesNotExist(key.to_string()))
    }

    /// Replace the value of an existing key. Writing the value already held is
    /// reported as [`StoreError::NoChangeMade`] rather than absorbed.
    pub fn update(&mut self, key: &str, value: impl Into<String>) -> Result<(), StoreError> {
        let value = value.into();
        let current = self
            .data
            .get_mut(key)
            .ok_or_else(|| StoreError::KeyDoesNotExist(key.to_string()))?;
        if *current == value {
            return Err(StoreError::NoChangeMade(key.to_string()));
        }
        *current = value;
        self.touch();
        Ok(())
    }

    pub fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.data
            .remove(key)
            .ok_or_else(|| StoreError::KeyDoesNotExist(key.to_string()))?;
        self.touch();
        Ok(())
    }

    pub fn replace_all(&mut self, data: BTreeMap<String, String>) {
        self.data = data;
        self.touch();
    }

    pub fn all_entries(&self) -> BTreeMap<String, String> {
        self.data.clone()
    }

    pub(crate) fn to_json(&self) -> Result<Zeroizing<Vec<u8>>, StoreError> {
        serde_json::to_vec(self)
            .map(Zeroizing::new)
            .map_err(StoreError::Serialise)
    }

    pub(crate) fn from_json(bytes: &[u8]) -> Result<Self, StoreError> {
        let document: Document = serde_json::from_slice(bytes).map_err(StoreError::Corrupt)?;
        if document.version != DOCUMENT_VERSION {
            return Err(StoreError::UnsupportedVersion(document.version));
        }
        if document.name.is_empty() {
            return Err(StoreError::InvalidDocument("empty store name"));
        }
        if document.data.contains_key("") {
            return Err(StoreError::InvalidDocument("empty item key"));
        }
        Ok(document)
    }

    fn touch(&mut self) {
        self.last_modified = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::new("test-store").unwrap()
    }

    #[test]
    fn empty_name_rejected() {
        assert!(matches!(Document::new(""), Err(StoreError::EmptyStoreName)));
    }

    #[test]
    fn new_document_is_empty_version_one() {
        let d = doc();
        assert_eq!(d.name(), "test-store");
        assert_eq!(d.version(), DOCUMENT_VERSION);
        assert!(d.is_empty());
    }

    #[test]
    fn create_then_get() {
        let mut d = doc();
        d.create("k", "v").unwrap();
        assert_eq!(d.get("k").unwrap(), "v");
        assert!(d.contains("k"));
    }

    #[test]
    fn create_rejects_empty_and_duplicate_keys() {
        let mut d = doc();
        assert!(matches!(d.create("", "v"), Err(StoreError::InvalidKey)));
        d.create("k", "v").unwrap();
        assert!(matches!(
            d.create("k", "anything"),
            Err(StoreError::KeyAlreadyExists(k)) if k == "k"
        ));
        assert_eq!(d.get("k").unwrap(), "v");
    }

    #[test]
    fn delete_then_get_fails() {
        let mut d = doc();
        d.create("k", "v").unwrap();
        d.delete("k").unwrap();
        assert!(matches!(d.get("k"), Err(StoreError::KeyDoesNotExist(_))));
        assert!(matches!(d.delete("k"), Err(StoreError::KeyDoesNotExist(_))));
    }

    #[test]
    fn update_reports_no_change_and_missing_key() {
        let mut d = doc();
        d.create("k", "v").unwrap();
        assert!(matches!(d.update("k", "v"), Err(StoreError::NoChangeMade(_))));
        assert!(matches!(
            d.update("missing", "x"),
            Err(StoreError::KeyDoesNotExist(_))
        ));
        d.update("k", "w").unwrap();
        assert_eq!(d.get("k").unwrap(), "w");
    }

    #[test]
    fn replace_all_and_snapshot() {
        let mut d = doc();
        d.create("old", "1").unwrap();
        let replacement = BTreeMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]);
        d.replace_all(replacement.clone());
        let mut snapshot = d.all_entries();
        assert_eq!(snapshot, replacement);
        snapshot.insert("c".into(), "3".into());
        assert!(!d.contains("c"));
        assert_eq!(d.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn debug_shows_counts_not_values() {
        let mut d = doc();
        d.create("bank", r#"{"password":"s3cret-value"}"#).unwrap();
        let rendered = format!("{d:?}");
        assert!(!rendered.contains("s3cret-value"));
        assert!(rendered.contains("entries: 1"));
    }

    #[test]
    fn legacy_passphrase_field_is_ignored() {
        let legacy = br#"{"name":"old","version":1,"data":{"k":"v"},"secretKey":"hunter22"}"#;
        let d = Document::from_json(legacy).unwrap();
        assert_eq!(d.get("k").unwrap(), "v");
        let json = String::from_utf8(d.to_json().unwrap().to_vec()).unwrap();
        assert!(!json.contains("secretKey"));
        assert!(!json.contains("hunter22"));
    }

    #[test]
    fn unknown_version_rejected() {
        let future = br#"{"name":"n","version":2,"data":{}}"#;
        assert!(matches!(
            Document::from_json(future),
            Err(StoreError::UnsupportedVersion(2))
        ));
        assert!(matches!(
            Document::from_json(b"not json"),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn empty_name_or_key_on_disk_rejected() {
        let nameless = br#"{"name":"","version":1,"data":{"k":"v"}}"#;
        assert!(matches!(
            Document::from_json(nameless),
            Err(StoreError::InvalidDocument(_))
        ));
        let blank_key = br#"{"name":"n","version":1,"data":{"":"v"}}"#;
        assert!(matches!(
            Document::from_json(blank_key),
            Err(StoreError::InvalidDocument(_))
        ));
    }
}
