//! Drain state tracking.
//!
//! At most one drain runs per engine. The running flag is claimed with a
//! compare-and-swap and released by [`DrainGuard`]'s `Drop`, so every exit
//! path of a drain (success, error, early return, panic) puts the engine
//! back to idle.

use contactsync_types::{ChangeKind, ContactId, SyncStatus};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Per-engine drain flag.
#[derive(Debug, Default)]
pub struct DrainState {
    draining: AtomicBool,
}

impl DrainState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the flag; `None` if a drain is already running.
    pub fn try_begin(&self) -> Option<DrainGuard<'_>> {
        self.draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| DrainGuard { state: self })
    }

    pub fn status(&self) -> SyncStatus {
        if self.draining.load(Ordering::Acquire) {
            SyncStatus::Draining
        } else {
            SyncStatus::Idle
        }
    }
}

/// Holds the drain flag for as long as it lives.
#[derive(Debug)]
pub struct DrainGuard<'a> {
    state: &'a DrainState,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.state.draining.store(false, Ordering::Release);
    }
}

/// A temporary identifier replaced by the server-issued one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remap {
    pub temporary: ContactId,
    pub canonical: ContactId,
}

/// A queued change the drain could not settle; it stays queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainFailure {
    pub id: ContactId,
    pub kind: ChangeKind,
    pub error: String,
}

/// What one drain did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Updates confirmed by the server.
    pub updated: Vec<ContactId>,
    /// Creates confirmed by the server, with their identifier remaps.
    pub created: Vec<Remap>,
    /// Deletes confirmed by the server.
    pub deleted: Vec<ContactId>,
    /// Entries confirmed by the server but changed locally while the request
    /// was in flight; the newer local state stays queued.
    pub superseded: Vec<ContactId>,
    /// Entries that failed and remain queued.
    pub failures: Vec<DrainFailure>,
}

impl DrainReport {
    /// True if every entry read at the start of the drain was settled.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of entries confirmed by the server.
    pub fn confirmed(&self) -> usize {
        self.updated.len() + self.created.len() + self.deleted.len() + self.superseded.len()
    }
}

/// Result of asking for a drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Another drain was already running; nothing was done.
    AlreadyDraining,
    /// The drain ran to completion.
    Completed(DrainReport),
}

impl DrainOutcome {
    /// The report, if a drain actually ran.
    pub fn report(&self) -> Option<&DrainReport> {
        match self {
            Self::AlreadyDraining => None,
            Self::Completed(report) => Some(report),
        }
    }
}
