//! User document and linked FI credentials

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A user document as held by the document store
///
/// Only `id`, `userId` and `fiKeys` are interpreted here. Every other field
/// of the stored document is carried through `extra` so a read-modify-write
/// never drops data this crate does not know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// Partition key of the document; same value as `id` in practice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub fi_keys: Vec<FiKey>,
    #[serde(flatten)]
    pub extra: HashMap<String, JsonValue>,
}

/// Credentials and sync position for one linked financial institution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiKey {
    pub item_id: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,
    /// Last synchronized position; `None` or empty before the first sync
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, JsonValue>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            user_id: Some(id.clone()),
            id,
            fi_keys: Vec::new(),
            extra: HashMap::new(),
        }
    }

    /// Partition key used by the store; falls back to the document id
    pub fn partition_key(&self) -> &str {
        self.user_id.as_deref().unwrap_or(&self.id)
    }

    /// Find a linked FI by item id
    pub fn fi_key(&self, item_id: &str) -> Option<&FiKey> {
        self.fi_keys.iter().find(|k| k.item_id == item_id)
    }

    /// Replace the FI list with an updated one, returning the previous list
    pub fn replace_fi_keys(&mut self, fi_keys: Vec<FiKey>) -> Vec<FiKey> {
        std::mem::replace(&mut self.fi_keys, fi_keys)
    }

    /// Serialize to the JSON document handed to the store
    pub fn to_document(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a stored JSON document
    pub fn from_document(document: &str) -> serde_json::Result<Self> {
        serde_json::from_str(document)
    }
}

impl FiKey {
    pub fn new(item_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            access_token: access_token.into(),
            institution_id: None,
            cursor: None,
            extra: HashMap::new(),
        }
    }

    pub fn with_institution(mut self, institution_id: impl Into<String>) -> Self {
        self.institution_id = Some(institution_id.into());
        self
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Cursor to send to the provider; empty cursors mean "from the beginning"
    pub fn sync_cursor(&self) -> Option<&str> {
        self.cursor.as_deref().filter(|c| !c.is_empty())
    }

    /// Validate the credential entry
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.item_id.trim().is_empty() {
            return Err("item id cannot be empty");
        }
        if self.access_token.trim().is_empty() {
            return Err("access token cannot be empty");
        }
        Ok(())
    }
}
