//! User service - manage user documents and their linked FIs

use std::sync::Arc;

use crate::adapters::duckdb::DuckDbUserStore;
use crate::domain::result::{Error, Result};
use crate::domain::{FiKey, User};
use crate::ports::UserStore;

/// Service for creating users and linking or unlinking institutions
pub struct UserService {
    store: Arc<DuckDbUserStore>,
}

impl UserService {
    pub fn new(store: Arc<DuckDbUserStore>) -> Self {
        Self { store }
    }

    /// Create an empty user document
    pub fn create_user(&self, id: &str) -> Result<User> {
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::validation("user id cannot be empty"));
        }
        if self.store.find_user(id, id)?.is_some() {
            return Err(Error::validation(format!("User '{}' already exists", id)));
        }

        let user = User::new(id);
        self.store.write_user_document(&user.to_document()?)?;
        Ok(user)
    }

    /// Fetch a user, failing with `NotFound` when there is none
    pub fn get_user(&self, id: &str) -> Result<User> {
        self.store
            .find_user(id, id)?
            .ok_or_else(|| Error::not_found(format!("User '{}'", id)))
    }

    /// All users, ordered by id
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.store.list_users()
    }

    /// Link an institution to a user
    ///
    /// Item ids are unique within a user; linking the same item twice is rejected.
    pub fn link_fi(&self, id: &str, key: FiKey) -> Result<User> {
        key.validate().map_err(Error::validation)?;

        let mut user = self.get_user(id)?;
        if user.fi_key(&key.item_id).is_some() {
            return Err(Error::validation(format!(
                "Item '{}' is already linked to user '{}'",
                key.item_id, id
            )));
        }

        user.fi_keys.push(key);
        self.store.write_user_document(&user.to_document()?)?;
        Ok(user)
    }

    /// Remove a linked institution, returning the removed key
    pub fn unlink_fi(&self, id: &str, item_id: &str) -> Result<FiKey> {
        let mut user = self.get_user(id)?;

        let position = user
            .fi_keys
            .iter()
            .position(|k| k.item_id == item_id)
            .ok_or_else(|| {
                Error::not_found(format!("Item '{}' is not linked to user '{}'", item_id, id))
            })?;

        let removed = user.fi_keys.remove(position);
        self.store.write_user_document(&user.to_document()?)?;
        Ok(removed)
    }
}
