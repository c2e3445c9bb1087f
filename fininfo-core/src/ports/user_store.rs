//! User document store port

use crate::domain::result::Result;
use crate::domain::User;

/// Document store holding one JSON document per user
///
/// Mirrors an input/output binding pair: the input side resolves a document
/// by id and partition key, the output side accepts a serialized document
/// and creates or replaces it.
pub trait UserStore: Send + Sync {
    /// Look up a user document, `None` when it does not exist
    fn find_user(&self, id: &str, user_id: &str) -> Result<Option<User>>;

    /// Create or replace a user document from its serialized JSON form
    fn write_user_document(&self, document: &str) -> Result<()>;
}
