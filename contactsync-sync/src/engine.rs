//! Sync engine: every read and mutation of the contact list goes through it.
//!
//! Mutations are applied to the local store first so reads reflect the
//! user's intent immediately. Online, the mutation is then sent to the
//! remote service and the confirmed record reconciled into the cache.
//! Offline, a change entry is queued in the same transaction as the local
//! write. [`SyncEngine::sync`] drains the queue once the service is
//! reachable again.

use crate::config::SyncConfig;
use crate::connectivity::Connectivity;
use crate::error::{SyncError, SyncResult};
use crate::http::HttpRemoteClient;
use crate::remote::RemoteClient;
use crate::state::{DrainFailure, DrainOutcome, DrainReport, DrainState, Remap};
use chrono::Utc;
use contactsync_storage::{CreateSettlement, LocalStore, LocalWrite};
use contactsync_types::{ChangeEntry, ChangeKind, ChangeOp, Contact, ContactId, SyncStatus};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Orchestrates the local store, the remote client and the connectivity
/// signal.
pub struct SyncEngine {
    config: SyncConfig,
    store: LocalStore,
    remote: Arc<dyn RemoteClient>,
    connectivity: Connectivity,
    drain: DrainState,
}

impl SyncEngine {
    /// Creates an engine over the given collaborators.
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteClient>,
        connectivity: Connectivity,
        config: SyncConfig,
    ) -> Self {
        Self {
            config,
            store,
            remote,
            connectivity,
            drain: DrainState::new(),
        }
    }

    /// Creates an engine talking HTTP to `config.remote.base_url`.
    pub fn with_http(
        store: LocalStore,
        connectivity: Connectivity,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        let remote = HttpRemoteClient::new(config.remote.clone())?;
        Ok(Self::new(store, Arc::new(remote), connectivity, config))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Whether a drain is running right now.
    pub fn status(&self) -> SyncStatus {
        self.drain.status()
    }

    // ── Mutations ────────────────────────────────────────────────

    /// Creates a contact.
    ///
    /// A contact without an identifier gets a temporary one. Offline, the
    /// contact is returned under that identifier and a create is queued.
    /// Online, the returned contact carries the server-issued identifier and
    /// the temporary record has been replaced.
    pub async fn create(&self, mut contact: Contact) -> SyncResult<Contact> {
        if contact.id.is_empty() {
            contact.id = ContactId::generate();
        }
        if contact.registration_date.is_none() {
            contact.registration_date = Some(Utc::now());
        }

        if !self.is_online() {
            self.store.record_offline(
                LocalWrite::Put(contact.clone()),
                ChangeEntry::create(contact.clone()),
            )?;
            info!("Queued offline create of {:?} as {}", contact.name, contact.id);
            return Ok(contact);
        }

        self.store.entities().put(&contact)?;
        let created = self
            .remote
            .create(&contact)
            .await
            .inspect_err(|e| warn!("Remote create of {} failed: {}", contact.id, e))?;
        self.store.remap_entity(&contact.id, &created)?;
        if created.id != contact.id {
            info!("Contact {} is now {}", contact.id, created.id);
        }
        Ok(created)
    }

    /// Replaces a contact.
    ///
    /// A contact with a change still queued is updated through the queue
    /// even when online, so the queued change and the new one cannot reach
    /// the server out of order.
    pub async fn update(&self, contact: Contact) -> SyncResult<Contact> {
        require_id(&contact.id, "update")?;
        let pending = self.store.changes().get(&contact.id)?;
        if matches!(pending.as_ref().map(|e| &e.op), Some(ChangeOp::Delete)) {
            return Err(SyncError::NotFound(contact.id.to_string()));
        }

        if !self.is_online() || pending.is_some() {
            self.store.record_offline(
                LocalWrite::Put(contact.clone()),
                ChangeEntry::update(contact.clone()),
            )?;
            debug!("Queued update of {}", contact.id);
            return Ok(contact);
        }

        self.store.entities().put(&contact)?;
        let confirmed = self
            .remote
            .update(&contact.id, &contact)
            .await
            .inspect_err(|e| warn!("Remote update of {} failed: {}", contact.id, e))?;
        self.store.entities().put(&confirmed)?;
        Ok(confirmed)
    }

    /// Deletes a contact. Deleting a contact whose create is still queued
    /// cancels the create; the server never hears of it.
    pub async fn delete(&self, id: &ContactId) -> SyncResult<()> {
        require_id(id, "delete")?;
        let pending = self.store.changes().get(id)?;

        if !self.is_online() || pending.is_some() {
            let stored = self
                .store
                .record_offline(LocalWrite::Delete(id.clone()), ChangeEntry::delete(id.clone()))?;
            match stored {
                Some(_) => debug!("Queued delete of {}", id),
                None => debug!("Delete of {} cancelled its queued create", id),
            }
            return Ok(());
        }

        self.store.entities().delete(id)?;
        self.remote
            .delete(id)
            .await
            .inspect_err(|e| warn!("Remote delete of {} failed: {}", id, e))?;
        Ok(())
    }

    /// Queues a change by hand, e.g. after an online mutation failed and the
    /// caller wants it replayed on the next drain.
    pub fn queue(&self, entry: ChangeEntry) -> SyncResult<Option<ChangeEntry>> {
        require_id(&entry.id, "queue")?;
        Ok(self.store.changes().append(entry)?)
    }

    // ── Reads ────────────────────────────────────────────────────

    /// All contacts, ordered by name ignoring case.
    ///
    /// Online, the cache is refreshed from the server first; if the server
    /// cannot be reached the cached list is returned instead.
    pub async fn get_all(&self) -> SyncResult<Vec<Contact>> {
        if self.is_online() {
            match self.remote.list().await {
                Ok(remote) => self.store.refresh_from_remote(&remote)?,
                Err(e) if e.is_remote_failure() => {
                    warn!("Listing contacts from server failed, using cache: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(self.store.entities().get_all()?)
    }

    /// One contact by identifier, with the same fallback as
    /// [`get_all`](Self::get_all).
    pub async fn get_by_id(&self, id: &ContactId) -> SyncResult<Contact> {
        require_id(id, "get")?;
        if self.is_online() {
            match self.remote.get(id).await {
                Ok(remote) => {
                    if self.store.cache_remote(&remote)? {
                        return Ok(remote);
                    }
                    debug!("Contact {} has queued changes, serving local copy", id);
                }
                Err(e) if e.is_remote_failure() => {
                    warn!("Fetching contact {} from server failed, using cache: {}", id, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(self.store.entities().get(id)?)
    }

    /// Cached contacts whose name contains `term`, ignoring case.
    pub fn search(&self, term: &str) -> SyncResult<Vec<Contact>> {
        Ok(self.store.entities().search(term)?)
    }

    /// Queued changes in queue order.
    pub fn pending(&self) -> SyncResult<Vec<ChangeEntry>> {
        Ok(self.store.changes().list_all()?)
    }

    /// Asks the server to generate `count` contacts and caches them.
    /// Best effort: offline or on failure nothing is created and the result
    /// is empty.
    pub async fn seed(&self, count: usize) -> SyncResult<Vec<Contact>> {
        if !self.is_online() {
            debug!("Offline, skipping seed");
            return Ok(Vec::new());
        }
        match self.remote.create_batch(count).await {
            Ok(created) => {
                self.store.entities().put_many(&created)?;
                Ok(created)
            }
            Err(e) => {
                warn!("Seeding contacts failed: {}", e);
                Ok(Vec::new())
            }
        }
    }

    // ── Drain ────────────────────────────────────────────────────

    /// Replays the change log against the remote service.
    ///
    /// Updates go first, then creates, then deletes. A failed entry stays
    /// queued and the drain moves on to the next one; only a local storage
    /// failure aborts the drain. Returns immediately if a drain is already
    /// running.
    pub async fn sync(&self) -> SyncResult<DrainOutcome> {
        let Some(_guard) = self.drain.try_begin() else {
            debug!("Drain already running, skipping");
            return Ok(DrainOutcome::AlreadyDraining);
        };

        let entries = self.store.changes().list_all()?;
        let mut report = DrainReport::default();
        if entries.is_empty() {
            debug!("Change log empty, nothing to drain");
            return Ok(DrainOutcome::Completed(report));
        }
        info!("Draining {} queued changes", entries.len());

        let (mut updates, mut creates, mut deletes) = (Vec::new(), Vec::new(), Vec::new());
        for entry in entries {
            match entry.kind() {
                ChangeKind::Update => updates.push(entry),
                ChangeKind::Create => creates.push(entry),
                ChangeKind::Delete => deletes.push(entry),
            }
        }

        for entry in updates.into_iter().chain(creates).chain(deletes) {
            self.replay(entry, &mut report).await?;
        }

        if report.is_clean() {
            info!("Drain finished: {} changes confirmed", report.confirmed());
        } else {
            warn!(
                "Drain finished: {} changes confirmed, {} still queued after failures",
                report.confirmed(),
                report.failures.len()
            );
        }
        Ok(DrainOutcome::Completed(report))
    }

    async fn replay(&self, entry: ChangeEntry, report: &mut DrainReport) -> SyncResult<()> {
        let ChangeEntry {
            id, op, revision, ..
        } = entry;
        let kind = op.kind();

        let sent = match op {
            ChangeOp::Update(snapshot) => match self.remote.update(&id, &snapshot).await {
                Ok(confirmed) => {
                    if self.store.settle_update(&id, revision, &confirmed)? {
                        report.updated.push(id.clone());
                    } else {
                        report.superseded.push(id.clone());
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            },
            ChangeOp::Create(snapshot) => match self.remote.create(&snapshot).await {
                Ok(canonical) => {
                    match self.store.settle_create(&id, revision, &canonical)? {
                        CreateSettlement::Remapped => {
                            info!("Contact {} is now {}", id, canonical.id);
                            report.created.push(Remap {
                                temporary: id.clone(),
                                canonical: canonical.id.clone(),
                            });
                        }
                        CreateSettlement::Requeued | CreateSettlement::DeleteQueued => {
                            info!(
                                "Contact {} is now {}, newer local change re-queued",
                                id, canonical.id
                            );
                            report.superseded.push(id.clone());
                        }
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            },
            ChangeOp::Delete => match self.remote.delete(&id).await {
                Ok(()) => {
                    if self.store.settle_delete(&id, revision)? {
                        report.deleted.push(id.clone());
                    } else {
                        report.superseded.push(id.clone());
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            },
        };

        if let Err(e) = sent {
            warn!("Replaying {} for {} failed, left queued: {}", kind, id, e);
            report.failures.push(DrainFailure {
                id,
                kind,
                error: e.to_string(),
            });
        }
        Ok(())
    }

    /// Spawns a task that drains the change log every time the connectivity
    /// signal goes from offline to online. The task ends once the engine is
    /// dropped and the signal changes again.
    pub fn spawn_reconnect_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::downgrade(self);
        let mut rx = self.connectivity.subscribe();
        tokio::spawn(async move {
            // The signal only notifies on change and the channel merges
            // unseen updates, so waking up online means a reconnect happened
            // since the last wake-up, even if the task missed the offline
            // state in between.
            while rx.changed().await.is_ok() {
                if !*rx.borrow_and_update() {
                    continue;
                }
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                if !engine.config.sync_on_reconnect {
                    continue;
                }
                info!("Back online, draining change log");
                match engine.sync().await {
                    Ok(DrainOutcome::Completed(report)) if !report.is_clean() => {
                        warn!("{} changes still queued after reconnect", report.failures.len());
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Drain after reconnect failed: {}", e),
                }
            }
        })
    }
}

fn require_id(id: &ContactId, operation: &str) -> SyncResult<()> {
    if id.is_empty() {
        return Err(SyncError::Validation(format!(
            "{operation} requires a contact identifier"
        )));
    }
    Ok(())
}
