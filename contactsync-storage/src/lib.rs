//! SQLite storage layer for contactsync.
//!
//! Provides the two persistent collections the sync engine works against:
//!
//! - [`EntityStore`]: the local cache of contacts, the source of truth for
//!   reads while offline
//! - [`ChangeLog`]: the durable queue of mutations made offline and not yet
//!   confirmed by the remote service
//!
//! Both live in one database behind one connection, so [`LocalStore`] can
//! offer operations that write to both collections in a single transaction
//! (offline mutations, identifier remaps after a create is confirmed).
//!
//! Schema migrations run automatically on open and are strictly additive.

mod change_log;
mod entity_store;
mod error;
mod schema;
mod store;

pub use change_log::ChangeLog;
pub use entity_store::EntityStore;
pub use error::{StorageError, StorageResult};
pub use schema::SCHEMA_VERSION;
pub use store::{CreateSettlement, LocalStore, LocalWrite};
