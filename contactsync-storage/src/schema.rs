//! Schema migrations.
//!
//! The applied version lives in `PRAGMA user_version`. Migrations only ever
//! add tables, columns and indexes; existing rows are never dropped.

use crate::error::{StorageError, StorageResult};
use rusqlite::{params, Connection, Transaction};
use tracing::{debug, info};

type Migration = fn(&Transaction<'_>) -> StorageResult<()>;

/// Ordered migrations; index `i` upgrades the schema from version `i` to `i + 1`.
const MIGRATIONS: &[Migration] = &[
    create_collections,
    add_ordering_and_revisions,
    add_revision_counter,
];

/// Latest schema version.
pub const SCHEMA_VERSION: u32 = MIGRATIONS.len() as u32;

/// Brings the database up to [`SCHEMA_VERSION`].
pub(crate) fn migrate(conn: &mut Connection) -> StorageResult<()> {
    let current: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current > SCHEMA_VERSION {
        return Err(StorageError::Migration(format!(
            "database schema version {current} is newer than supported version {SCHEMA_VERSION}"
        )));
    }
    if current == SCHEMA_VERSION {
        debug!("Schema up to date at version {}", current);
        return Ok(());
    }

    for (index, migration) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        let target = index as u32 + 1;
        let tx = conn.transaction()?;
        migration(&tx)
            .map_err(|e| StorageError::Migration(format!("upgrade to version {target}: {e}")))?;
        tx.pragma_update(None, "user_version", target)?;
        tx.commit()?;
        info!("Migrated local store schema to version {}", target);
    }
    Ok(())
}

fn create_collections(tx: &Transaction<'_>) -> StorageResult<()> {
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS entities (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            data TEXT NOT NULL,
            image BLOB,
            image_type TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS changes (
            id TEXT PRIMARY KEY,
            seq INTEGER NOT NULL,
            kind TEXT NOT NULL,
            payload TEXT
        );
        ",
    )?;
    Ok(())
}

fn add_ordering_and_revisions(tx: &Transaction<'_>) -> StorageResult<()> {
    tx.execute_batch(
        "
        ALTER TABLE entities ADD COLUMN sort_key TEXT NOT NULL DEFAULT '';
        ALTER TABLE changes ADD COLUMN revision INTEGER NOT NULL DEFAULT 0;
        ALTER TABLE changes ADD COLUMN queued_at TEXT NOT NULL DEFAULT '';
        CREATE INDEX IF NOT EXISTS idx_entities_sort ON entities (sort_key, name, id);
        CREATE INDEX IF NOT EXISTS idx_changes_seq ON changes (seq);
        ",
    )?;

    // SQLite's lower() only folds ASCII, so backfill the sort key in Rust.
    let rows: Vec<(String, String)> = {
        let mut stmt = tx.prepare("SELECT id, name FROM entities")?;
        let mapped = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        mapped.collect::<Result<_, _>>()?
    };
    for (id, name) in rows {
        tx.execute(
            "UPDATE entities SET sort_key = ?1 WHERE id = ?2",
            params![name.to_lowercase(), id],
        )?;
    }
    Ok(())
}

// Revisions are drawn from one counter so an identifier that gets a fresh
// entry never reuses a revision a drain may still be holding.
fn add_revision_counter(tx: &Transaction<'_>) -> StorageResult<()> {
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS counters (
            name TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );
        INSERT OR IGNORE INTO counters (name, value)
            SELECT 'revision', COALESCE(MAX(revision), 0) FROM changes;
        ",
    )?;
    Ok(())
}
