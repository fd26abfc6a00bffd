//! The local store: one SQLite database holding both collections.
//!
//! [`EntityStore`] and [`ChangeLog`] are cheap views over the same
//! connection. Operations that must touch both collections atomically are
//! exposed here, each as a single transaction.

use crate::change_log::{self, ChangeLog};
use crate::entity_store::{self, EntityStore};
use crate::error::{StorageError, StorageResult};
use crate::schema;
use contactsync_types::{ChangeEntry, ChangeOp, Contact, ContactId};
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

pub(crate) type SharedConnection = Arc<Mutex<Connection>>;

pub(crate) fn lock(conn: &SharedConnection) -> StorageResult<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|_| StorageError::LockPoisoned)
}

/// The entity-side half of an offline mutation.
#[derive(Debug, Clone)]
pub enum LocalWrite {
    Put(Contact),
    Delete(ContactId),
}

/// How a drained Create was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateSettlement {
    /// The temporary record was replaced by the canonical one and the entry
    /// removed.
    Remapped,
    /// The contact was edited while the create was in flight; the newer
    /// snapshot was re-queued as an update against the canonical id.
    Requeued,
    /// The contact was deleted while the create was in flight; a delete of
    /// the canonical id was queued.
    DeleteQueued,
}

/// Handle to the local database.
#[derive(Clone)]
pub struct LocalStore {
    conn: SharedConnection,
}

impl LocalStore {
    /// Opens (or creates) the store at `path` and applies pending migrations.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        info!("Opened local store at {}", path.display());
        Self::init(conn)
    }

    /// Opens a throwaway in-memory store (for tests and dry runs).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> StorageResult<Self> {
        schema::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// The contact cache.
    pub fn entities(&self) -> EntityStore {
        EntityStore::new(self.conn.clone())
    }

    /// The pending-mutation queue.
    pub fn changes(&self) -> ChangeLog {
        ChangeLog::new(self.conn.clone())
    }

    /// Applies an offline mutation: the entity write and the change-log
    /// append commit together or not at all.
    pub fn record_offline(
        &self,
        write: LocalWrite,
        change: ChangeEntry,
    ) -> StorageResult<Option<ChangeEntry>> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        match &write {
            LocalWrite::Put(contact) => entity_store::put_contact(&tx, contact)?,
            LocalWrite::Delete(id) => {
                entity_store::delete_contact(&tx, id)?;
            }
        }
        let stored = change_log::append_change(&tx, change)?;
        tx.commit()?;
        Ok(stored)
    }

    /// Replaces the record stored under `temp_id` with the server's canonical
    /// record after an online create.
    pub fn remap_entity(&self, temp_id: &ContactId, canonical: &Contact) -> StorageResult<()> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        if temp_id != &canonical.id {
            entity_store::delete_contact(&tx, temp_id)?;
        }
        entity_store::put_contact(&tx, canonical)?;
        tx.commit()?;
        Ok(())
    }

    /// Settles a queued create that the server confirmed as `canonical`.
    ///
    /// `drained_revision` is the revision the drain read before sending the
    /// request. If the entry moved on in the meantime the newer local intent
    /// is carried over to the canonical identifier instead of being dropped.
    pub fn settle_create(
        &self,
        temp_id: &ContactId,
        drained_revision: u64,
        canonical: &Contact,
    ) -> StorageResult<CreateSettlement> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        let current = change_log::get_change(&tx, temp_id)?;

        let settlement = match current {
            Some(entry) if entry.revision == drained_revision => {
                change_log::remove_change(&tx, temp_id)?;
                entity_store::delete_contact(&tx, temp_id)?;
                entity_store::put_contact(&tx, canonical)?;
                CreateSettlement::Remapped
            }
            Some(entry) => {
                change_log::remove_change(&tx, temp_id)?;
                entity_store::delete_contact(&tx, temp_id)?;
                match entry.op {
                    ChangeOp::Create(mut latest) | ChangeOp::Update(mut latest) => {
                        latest.id = canonical.id.clone();
                        entity_store::put_contact(&tx, &latest)?;
                        change_log::append_change(&tx, ChangeEntry::update(latest))?;
                        CreateSettlement::Requeued
                    }
                    ChangeOp::Delete => {
                        change_log::append_change(&tx, ChangeEntry::delete(canonical.id.clone()))?;
                        CreateSettlement::DeleteQueued
                    }
                }
            }
            None => {
                entity_store::delete_contact(&tx, temp_id)?;
                change_log::append_change(&tx, ChangeEntry::delete(canonical.id.clone()))?;
                CreateSettlement::DeleteQueued
            }
        };
        tx.commit()?;
        debug!(
            "Settled create {} -> {}: {:?}",
            temp_id, canonical.id, settlement
        );
        Ok(settlement)
    }

    /// Settles a queued update confirmed by the server. Returns false (and
    /// leaves everything in place) if the entry changed while in flight.
    pub fn settle_update(
        &self,
        id: &ContactId,
        drained_revision: u64,
        confirmed: &Contact,
    ) -> StorageResult<bool> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        if !change_log::remove_change_at(&tx, id, drained_revision)? {
            return Ok(false);
        }
        entity_store::put_contact(&tx, confirmed)?;
        tx.commit()?;
        Ok(true)
    }

    /// Settles a queued delete confirmed by the server.
    pub fn settle_delete(&self, id: &ContactId, drained_revision: u64) -> StorageResult<bool> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        if !change_log::remove_change_at(&tx, id, drained_revision)? {
            return Ok(false);
        }
        entity_store::delete_contact(&tx, id)?;
        tx.commit()?;
        Ok(true)
    }

    /// Merges the server's full list into the cache.
    ///
    /// Contacts with a queued change keep their local state. Cached contacts
    /// the server no longer has are dropped unless a change is queued for
    /// them (e.g. a create that has not been sent yet).
    pub fn refresh_from_remote(&self, remote: &[Contact]) -> StorageResult<()> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        let pending: HashSet<ContactId> = change_log::list_changes(&tx)?
            .into_iter()
            .map(|e| e.id)
            .collect();
        let remote_ids: HashSet<&ContactId> = remote.iter().map(|c| &c.id).collect();

        for contact in remote.iter().filter(|c| !pending.contains(&c.id)) {
            entity_store::put_contact(&tx, contact)?;
        }
        let mut dropped = 0usize;
        for id in entity_store::all_ids(&tx)? {
            if !remote_ids.contains(&id) && !pending.contains(&id) {
                entity_store::delete_contact(&tx, &id)?;
                dropped += 1;
            }
        }
        tx.commit()?;
        debug!(
            "Refreshed cache with {} remote contacts ({} pending kept, {} stale dropped)",
            remote.len(),
            pending.len(),
            dropped
        );
        Ok(())
    }

    /// Caches a single record fetched from the server unless a local change
    /// for it is still queued. Returns whether the cache was written.
    pub fn cache_remote(&self, contact: &Contact) -> StorageResult<bool> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        if change_log::get_change(&tx, &contact.id)?.is_some() {
            return Ok(false);
        }
        entity_store::put_contact(&tx, contact)?;
        tx.commit()?;
        Ok(true)
    }
}
