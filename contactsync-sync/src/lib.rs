//! Offline-first sync engine for contactsync.
//!
//! Every read and mutation of the contact list goes through [`SyncEngine`].
//! While the remote service is reachable, mutations are sent straight to it
//! and the confirmed records are cached locally. While it is not, mutations
//! are applied to the local cache and queued in the change log; a drain
//! replays the queue once connectivity returns.
//!
//! # Architecture
//!
//! - **Remote**: [`RemoteClient`] abstracts the contacts service;
//!   [`HttpRemoteClient`] speaks its REST dialect over reqwest
//! - **Connectivity**: [`Connectivity`] is the shared online/offline signal
//! - **State**: [`DrainState`] keeps drains from overlapping
//! - **Engine**: [`SyncEngine`] routes operations and drains the queue
//!
//! ## Drain
//!
//! 1. Claim the drain flag; a second caller returns immediately
//! 2. Read the change log in queue order
//! 3. Replay updates, then creates, then deletes
//! 4. Settle each confirmed entry against the revision that was sent, so a
//!    local edit made while the request was in flight stays queued
//! 5. Leave failed entries queued for the next drain
//!
//! # Example
//!
//! ```no_run
//! use contactsync_storage::LocalStore;
//! use contactsync_sync::{Connectivity, SyncConfig, SyncEngine};
//! use contactsync_types::Contact;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = LocalStore::open("contacts.db")?;
//! let engine = SyncEngine::with_http(store, Connectivity::offline(), SyncConfig::default())?;
//!
//! let ada = engine.create(Contact::new("Ada Lovelace")).await?;
//! assert_eq!(engine.pending()?.len(), 1);
//!
//! engine.connectivity().set_online(true);
//! engine.sync().await?;
//! # let _ = ada;
//! # Ok(())
//! # }
//! ```

mod config;
mod connectivity;
mod engine;
mod error;
pub mod http;
pub mod remote;
pub mod state;

pub use config::{RemoteConfig, SyncConfig};
pub use connectivity::Connectivity;
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use http::{HttpRemoteClient, SERVER_BATCH_SIZE};
pub use remote::RemoteClient;
pub use state::{DrainFailure, DrainGuard, DrainOutcome, DrainReport, DrainState, Remap};
