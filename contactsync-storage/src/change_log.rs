//! Change log: durable queue of mutations not yet confirmed by the server.
//!
//! Entries are keyed by the identifier of the contact they target, so there
//! is at most one live entry per contact. Appending to an identifier that
//! already has an entry folds the two with [`ChangeOp::coalesce`], keeping
//! the original queue position and taking a new revision.
//!
//! Revisions come from a counter shared by every entry, so no two entries
//! ever carry the same revision, even for the same identifier.

use crate::error::{StorageError, StorageResult};
use crate::store::{lock, SharedConnection};
use chrono::{DateTime, Utc};
use contactsync_types::{ChangeEntry, ChangeKind, ChangeOp, Contact, ContactId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

/// Persistent queue of pending mutations.
#[derive(Clone)]
pub struct ChangeLog {
    conn: SharedConnection,
}

impl ChangeLog {
    pub(crate) fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Queues `entry`, coalescing with any entry already queued for the same
    /// contact. Returns the entry as stored, or `None` if the two cancelled
    /// out and nothing remains queued.
    pub fn append(&self, entry: ChangeEntry) -> StorageResult<Option<ChangeEntry>> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        let stored = append_change(&tx, entry)?;
        tx.commit()?;
        Ok(stored)
    }

    /// Loads the entry queued for `id`, if any.
    pub fn get(&self, id: &ContactId) -> StorageResult<Option<ChangeEntry>> {
        let conn = lock(&self.conn)?;
        get_change(&conn, id)
    }

    /// All entries in the order they were first queued.
    pub fn list_all(&self) -> StorageResult<Vec<ChangeEntry>> {
        let conn = lock(&self.conn)?;
        list_changes(&conn)
    }

    /// Removes the entry for `id`. Idempotent; returns whether one existed.
    pub fn remove(&self, id: &ContactId) -> StorageResult<bool> {
        let conn = lock(&self.conn)?;
        remove_change(&conn, id)
    }

    /// Removes every entry; returns how many were dropped.
    pub fn clear(&self) -> StorageResult<usize> {
        let conn = lock(&self.conn)?;
        Ok(conn.execute("DELETE FROM changes", [])?)
    }

    /// Number of queued entries.
    pub fn len(&self) -> StorageResult<usize> {
        let conn = lock(&self.conn)?;
        count_changes(&conn)
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}

pub(crate) fn append_change(
    conn: &Connection,
    entry: ChangeEntry,
) -> StorageResult<Option<ChangeEntry>> {
    if entry.id.is_empty() {
        return Err(StorageError::InvalidData(
            "cannot queue a change without a target identifier".to_string(),
        ));
    }
    let existing = get_change(conn, &entry.id)?;
    let merged = ChangeOp::coalesce(existing.as_ref().map(|e| &e.op), entry.op);

    match (existing, merged) {
        (None, Some(op)) => {
            let seq: i64 =
                conn.query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM changes", [], |row| {
                    row.get(0)
                })?;
            let stored = ChangeEntry {
                id: entry.id,
                op,
                revision: next_revision(conn)?,
                queued_at: entry.queued_at,
            };
            conn.execute(
                "INSERT INTO changes (id, seq, kind, payload, revision, queued_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    stored.id.as_str(),
                    seq,
                    stored.kind().as_str(),
                    encode_payload(&stored.op)?,
                    stored.revision as i64,
                    stored.queued_at.to_rfc3339(),
                ],
            )?;
            debug!(
                "Queued {} for {} (revision {})",
                stored.kind(),
                stored.id,
                stored.revision
            );
            Ok(Some(stored))
        }
        (Some(existing), Some(op)) => {
            let stored = ChangeEntry {
                id: existing.id,
                op,
                revision: next_revision(conn)?,
                queued_at: existing.queued_at,
            };
            conn.execute(
                "UPDATE changes SET kind = ?2, payload = ?3, revision = ?4 WHERE id = ?1",
                params![
                    stored.id.as_str(),
                    stored.kind().as_str(),
                    encode_payload(&stored.op)?,
                    stored.revision as i64,
                ],
            )?;
            debug!(
                "Coalesced queued {} for {} (revision {})",
                stored.kind(),
                stored.id,
                stored.revision
            );
            Ok(Some(stored))
        }
        (Some(existing), None) => {
            remove_change(conn, &existing.id)?;
            debug!("Queued create for {} cancelled by delete", existing.id);
            Ok(None)
        }
        (None, None) => Ok(None),
    }
}

fn next_revision(conn: &Connection) -> StorageResult<u64> {
    conn.execute(
        "UPDATE counters SET value = value + 1 WHERE name = 'revision'",
        [],
    )?;
    let value: i64 = conn.query_row(
        "SELECT value FROM counters WHERE name = 'revision'",
        [],
        |row| row.get(0),
    )?;
    Ok(value as u64)
}

pub(crate) fn get_change(conn: &Connection, id: &ContactId) -> StorageResult<Option<ChangeEntry>> {
    let row = conn
        .query_row(
            "SELECT id, kind, payload, revision, queued_at FROM changes WHERE id = ?1",
            params![id.as_str()],
            read_row,
        )
        .optional()?;
    row.map(decode).transpose()
}

pub(crate) fn list_changes(conn: &Connection) -> StorageResult<Vec<ChangeEntry>> {
    let mut stmt =
        conn.prepare("SELECT id, kind, payload, revision, queued_at FROM changes ORDER BY seq")?;
    let rows = stmt.query_map([], read_row)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(decode(row?)?);
    }
    Ok(entries)
}

pub(crate) fn remove_change(conn: &Connection, id: &ContactId) -> StorageResult<bool> {
    let removed = conn.execute("DELETE FROM changes WHERE id = ?1", params![id.as_str()])?;
    Ok(removed > 0)
}

pub(crate) fn remove_change_at(
    conn: &Connection,
    id: &ContactId,
    revision: u64,
) -> StorageResult<bool> {
    let removed = conn.execute(
        "DELETE FROM changes WHERE id = ?1 AND revision = ?2",
        params![id.as_str(), revision as i64],
    )?;
    Ok(removed > 0)
}

fn count_changes(conn: &Connection) -> StorageResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM changes", [], |row| row.get(0))?;
    Ok(count as usize)
}

type RawChange = (String, String, Option<String>, i64, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawChange> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn encode_payload(op: &ChangeOp) -> StorageResult<Option<String>> {
    op.snapshot()
        .map(serde_json::to_string)
        .transpose()
        .map_err(Into::into)
}

fn decode((id, kind, payload, revision, queued_at): RawChange) -> StorageResult<ChangeEntry> {
    let kind: ChangeKind = kind.parse()?;
    let snapshot = || -> StorageResult<Contact> {
        let json = payload
            .as_deref()
            .ok_or_else(|| StorageError::InvalidData(format!("{kind} entry for {id} has no payload")))?;
        Ok(serde_json::from_str(json)?)
    };
    let op = match kind {
        ChangeKind::Create => ChangeOp::Create(snapshot()?),
        ChangeKind::Update => ChangeOp::Update(snapshot()?),
        ChangeKind::Delete => ChangeOp::Delete,
    };
    // Rows written before queued_at existed carry an empty string.
    let queued_at = DateTime::parse_from_rfc3339(&queued_at)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    Ok(ChangeEntry {
        id: ContactId::new(id),
        op,
        revision: revision.max(0) as u64,
        queued_at,
    })
}
