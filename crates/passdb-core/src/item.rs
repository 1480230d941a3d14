use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ItemError;

/// A password-manager entry. The store only ever sees its JSON form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub id: Uuid,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Item {
    pub fn new(
        name: &str,
        username: &str,
        password: &str,
        url: &str,
        notes: Vec<String>,
    ) -> Result<Self, ItemError> {
        if name.is_empty() {
            return Err(ItemError::NoNameSupplied);
        }
        if username.is_empty() && password.is_empty() && url.is_empty() && notes.is_empty() {
            return Err(ItemError::InsufficientInformation);
        }
        Ok(Self {
            name: name.to_string(),
            id: Uuid::new_v4(),
            username: username.to_string(),
            password: password.to_string(),
            url: url.to_string(),
            notes,
        })
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("url", &self.url)
            .field("notes", &self.notes.len())
            .finish()
    }
}
