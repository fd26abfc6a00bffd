//! Entity store: the local cache of contacts.
//!
//! Contacts are stored as JSON blobs keyed by identifier, with the image
//! payload split out into its own BLOB column. Reads are ordered by a
//! case-folded copy of the name so the local view matches the ordering the
//! remote service uses.

use crate::error::{StorageError, StorageResult};
use crate::store::{lock, SharedConnection};
use contactsync_types::{Contact, ContactId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;

/// Keyed, persistent cache of contacts.
///
/// Every method is a single transaction. Multi-collection operations live on
/// [`LocalStore`](crate::LocalStore).
#[derive(Clone)]
pub struct EntityStore {
    conn: SharedConnection,
}

impl EntityStore {
    pub(crate) fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Inserts or replaces a contact by identifier.
    pub fn put(&self, contact: &Contact) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        put_contact(&conn, contact)
    }

    /// Inserts or replaces several contacts in one transaction.
    pub fn put_many(&self, contacts: &[Contact]) -> StorageResult<()> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        for contact in contacts {
            put_contact(&tx, contact)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Loads one contact; `StorageError::NotFound` if absent.
    pub fn get(&self, id: &ContactId) -> StorageResult<Contact> {
        let conn = lock(&self.conn)?;
        get_contact(&conn, id)?.ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    /// Returns every contact ordered by name, ignoring case.
    pub fn get_all(&self) -> StorageResult<Vec<Contact>> {
        let conn = lock(&self.conn)?;
        all_contacts(&conn)
    }

    /// Returns the contacts whose name contains `term`, ignoring case, in
    /// the same order as [`get_all`](Self::get_all).
    pub fn search(&self, term: &str) -> StorageResult<Vec<Contact>> {
        let mut contacts = self.get_all()?;
        contacts.retain(|c| c.matches_name(term));
        Ok(contacts)
    }

    /// Removes a contact. Deleting an absent identifier is not an error;
    /// the return value says whether a row was removed.
    pub fn delete(&self, id: &ContactId) -> StorageResult<bool> {
        let conn = lock(&self.conn)?;
        delete_contact(&conn, id)
    }

    /// Number of cached contacts.
    pub fn count(&self) -> StorageResult<usize> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

pub(crate) fn put_contact(conn: &Connection, contact: &Contact) -> StorageResult<()> {
    if contact.id.is_empty() {
        return Err(StorageError::InvalidData(
            "cannot store a contact without an identifier".to_string(),
        ));
    }
    let mut body = contact.clone();
    let image = body.image.take();
    let data = serde_json::to_string(&body)?;
    conn.execute(
        "INSERT INTO entities (id, name, sort_key, data, image, image_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            sort_key = excluded.sort_key,
            data = excluded.data,
            image = excluded.image,
            image_type = excluded.image_type",
        params![
            contact.id.as_str(),
            contact.name,
            contact.sort_key(),
            data,
            image,
            contact.image_type,
        ],
    )?;
    Ok(())
}

pub(crate) fn get_contact(conn: &Connection, id: &ContactId) -> StorageResult<Option<Contact>> {
    let row = conn
        .query_row(
            "SELECT data, image FROM entities WHERE id = ?1",
            params![id.as_str()],
            read_row,
        )
        .optional()?;
    row.map(decode).transpose()
}

pub(crate) fn all_contacts(conn: &Connection) -> StorageResult<Vec<Contact>> {
    // sort_key is the Unicode-lowercased name; SQLite's BINARY collation
    // compares it bytewise, the same order as `Contact::cmp_by_name`.
    let mut stmt = conn.prepare("SELECT data, image FROM entities ORDER BY sort_key, name, id")?;
    let rows = stmt.query_map([], read_row)?;
    let mut contacts = Vec::new();
    for row in rows {
        contacts.push(decode(row?)?);
    }
    Ok(contacts)
}

pub(crate) fn all_ids(conn: &Connection) -> StorageResult<HashSet<ContactId>> {
    let mut stmt = conn.prepare("SELECT id FROM entities")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut ids = HashSet::new();
    for id in rows {
        ids.insert(ContactId::new(id?));
    }
    Ok(ids)
}

pub(crate) fn delete_contact(conn: &Connection, id: &ContactId) -> StorageResult<bool> {
    let removed = conn.execute("DELETE FROM entities WHERE id = ?1", params![id.as_str()])?;
    Ok(removed > 0)
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<(String, Option<Vec<u8>>)> {
    Ok((row.get(0)?, row.get(1)?))
}

fn decode((data, image): (String, Option<Vec<u8>>)) -> StorageResult<Contact> {
    let mut contact: Contact = serde_json::from_str(&data)?;
    contact.image = image;
    Ok(contact)
}
