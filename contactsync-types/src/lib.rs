//! Core type definitions for contactsync.
//!
//! This crate defines the data model shared by the storage layer, the sync
//! engine and the command-line front end:
//! - Contact identifiers (server-issued or locally generated)
//! - The contact record itself
//! - Queued change entries and the coalescing policy applied to them
//!
//! Nothing in here performs I/O.

mod change;
mod contact;
mod ids;

pub use change::{ChangeEntry, ChangeKind, ChangeOp, SyncStatus};
pub use contact::Contact;
pub use ids::ContactId;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown change kind: {0}")]
    UnknownChangeKind(String),
}
