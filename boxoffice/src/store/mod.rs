//! Identity and ticket storage.
//!
//! The store traits are implemented by leased sessions, so every call happens
//! inside a [`TransactionScope`](crate::scope::TransactionScope).

mod models;
mod sqlite;

pub use models::{Role, TicketRecord, UserRecord, UserUpdate};
pub use sqlite::{SqliteBackend, SqliteSession};

use uuid::Uuid;

use crate::error::StoreError;
use crate::lookup::LookupDigest;

/// Generates a primary key: a random UUID as 32 lowercase hex characters.
#[must_use]
pub fn new_key() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Account rows.
pub trait IdentityStore {
    /// Fetches a user by primary key.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn get_by_key(&self, uuid: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Fetches every user whose email digest matches.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn find_by_digest(&self, digest: &LookupDigest) -> Result<Vec<UserRecord>, StoreError>;

    /// Fetches every user.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn list_users(&self) -> Result<Vec<UserRecord>, StoreError>;

    /// Inserts a user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the uuid or email digest is taken.
    fn insert_user(&self, user: &UserRecord) -> Result<(), StoreError>;

    /// Applies an update to one user. Returns `false` if no row matched.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the new email digest is taken.
    fn update_user(&self, uuid: &str, update: &UserUpdate) -> Result<bool, StoreError>;

    /// Deletes a user and their tickets. Returns `false` if no row matched.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails.
    fn delete_user(&self, uuid: &str) -> Result<bool, StoreError>;
}

/// Ticket rows, always filtered by owner.
pub trait TicketStore {
    /// Lists the owner's tickets.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn list_tickets(&self, owner: &str) -> Result<Vec<TicketRecord>, StoreError>;

    /// Fetches one of the owner's tickets.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn get_ticket(&self, uuid: &str, owner: &str) -> Result<Option<TicketRecord>, StoreError>;

    /// Inserts a ticket.
    ///
    /// # Errors
    ///
    /// Returns error if the owner does not exist or the uuid is taken.
    fn insert_ticket(&self, ticket: &TicketRecord) -> Result<(), StoreError>;

    /// Deletes one of the owner's tickets. Returns `false` if no row matched.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails.
    fn delete_ticket(&self, uuid: &str, owner: &str) -> Result<bool, StoreError>;

    /// Deletes all of the owner's tickets, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails.
    fn delete_all_tickets(&self, owner: &str) -> Result<usize, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_key_format() {
        let key = new_key();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(key, new_key());
    }
}
