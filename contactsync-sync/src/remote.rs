//! Remote client abstraction.
//!
//! Defines the interface to the remote contacts service so the engine can
//! run against HTTP in production and a scripted double in tests. None of
//! the calls retry internally; retrying is the engine's and the caller's
//! business.

use crate::error::SyncResult;
use async_trait::async_trait;
use contactsync_types::{Contact, ContactId};

/// CRUD access to the remote contacts service.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Lists every contact, ordered by name ascending ignoring case.
    async fn list(&self) -> SyncResult<Vec<Contact>>;

    /// Fetches one contact; `SyncError::NotFound` if the server has none.
    async fn get(&self, id: &ContactId) -> SyncResult<Contact>;

    /// Creates a contact and returns the stored record carrying the
    /// server-assigned identifier. The id of `contact` is not sent.
    async fn create(&self, contact: &Contact) -> SyncResult<Contact>;

    /// Replaces the contact stored under `id` and returns the stored record.
    async fn update(&self, id: &ContactId, contact: &Contact) -> SyncResult<Contact>;

    /// Deletes a contact. Deleting a contact the server no longer has is
    /// not an error.
    async fn delete(&self, id: &ContactId) -> SyncResult<()>;

    /// Asks the server to generate up to `count` contacts. Best effort: a
    /// partial failure returns whatever was created.
    async fn create_batch(&self, count: usize) -> SyncResult<Vec<Contact>>;
}
