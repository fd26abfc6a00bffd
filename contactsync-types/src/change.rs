//! Queued changes awaiting confirmation by the remote service.
//!
//! A change entry is created when a mutation cannot be sent to the remote
//! service right away and is destroyed once the service confirms it. There is at most one
//! live entry per contact: later mutations are folded into the existing
//! entry by [`ChangeOp::coalesce`].

use crate::{Contact, ContactId, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The operation a change entry replays against the remote service.
///
/// Create and Update carry a full snapshot of the contact as it was when the
/// mutation was queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "contact")]
pub enum ChangeOp {
    Create(Contact),
    Update(Contact),
    Delete,
}

impl ChangeOp {
    /// Returns the operation tag.
    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Create(_) => ChangeKind::Create,
            Self::Update(_) => ChangeKind::Update,
            Self::Delete => ChangeKind::Delete,
        }
    }

    /// Returns the snapshot carried by Create/Update.
    #[must_use]
    pub fn snapshot(&self) -> Option<&Contact> {
        match self {
            Self::Create(c) | Self::Update(c) => Some(c),
            Self::Delete => None,
        }
    }

    /// Folds an incoming mutation into the entry already queued for the same
    /// contact. Returns `None` when nothing should remain queued.
    ///
    /// | existing \ incoming | Create(p) | Update(p) | Delete |
    /// |---|---|---|---|
    /// | none   | Create(p) | Update(p) | Delete |
    /// | Create | Create(p) | Create(p) | none   |
    /// | Update | Create(p) | Update(p) | Delete |
    /// | Delete | Delete    | Delete    | Delete |
    ///
    /// A contact that was never sent to the server stays a Create no matter
    /// how often it is edited, and deleting it cancels the Create outright.
    #[must_use]
    pub fn coalesce(existing: Option<&ChangeOp>, incoming: ChangeOp) -> Option<ChangeOp> {
        match (existing, incoming) {
            (None, incoming) => Some(incoming),
            (Some(Self::Delete), _) => Some(Self::Delete),
            (Some(Self::Create(_)), Self::Delete) => None,
            (Some(Self::Create(_)), Self::Create(c) | Self::Update(c)) => Some(Self::Create(c)),
            (Some(Self::Update(_)), incoming) => Some(incoming),
        }
    }
}

/// Operation tag without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::UnknownChangeKind(other.to_string())),
        }
    }
}

/// A pending mutation, keyed by the identifier of the contact it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Target contact; also the key of the entry in the change log.
    pub id: ContactId,
    /// What to replay.
    pub op: ChangeOp,
    /// Assigned by the change log from a store-wide counter each time the
    /// entry is queued or another mutation is folded into it. A drain only
    /// removes the entry if the revision it read is still current, so edits
    /// made while a request is in flight are kept.
    pub revision: u64,
    /// When the entry was first queued.
    pub queued_at: DateTime<Utc>,
}

impl ChangeEntry {
    /// Creates an entry at revision 0; the change log assigns the real
    /// revision when it is queued.
    #[must_use]
    pub fn new(id: ContactId, op: ChangeOp) -> Self {
        Self {
            id,
            op,
            revision: 0,
            queued_at: Utc::now(),
        }
    }

    /// Queues the creation of `contact` under its (temporary) identifier.
    #[must_use]
    pub fn create(contact: Contact) -> Self {
        Self::new(contact.id.clone(), ChangeOp::Create(contact))
    }

    /// Queues an update carrying the full snapshot of `contact`.
    #[must_use]
    pub fn update(contact: Contact) -> Self {
        Self::new(contact.id.clone(), ChangeOp::Update(contact))
    }

    /// Queues the deletion of `id`.
    #[must_use]
    pub fn delete(id: ContactId) -> Self {
        Self::new(id, ChangeOp::Delete)
    }

    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        self.op.kind()
    }
}

/// Whether a drain is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncStatus {
    #[default]
    Idle,
    Draining,
}
