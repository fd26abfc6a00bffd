//! Argument definitions and command execution for the `contactsync` binary.
//!
//! Commands return JSON values so the binary only has to print them; the
//! tests drive [`run`] directly.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use contactsync_storage::LocalStore;
use contactsync_sync::{Connectivity, DrainOutcome, RemoteConfig, SyncConfig, SyncEngine};
use contactsync_types::{ChangeEntry, ChangeKind, Contact, ContactId};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "contactsync", version)]
#[command(about = "Offline-first contact list client")]
pub struct Cli {
    /// Path to the local database
    #[arg(long, env = "CONTACTSYNC_DB", default_value = "contactsync.db")]
    pub db: PathBuf,

    /// Base URL of the contacts service
    #[arg(long, env = "CONTACTSYNC_SERVER", default_value = "http://localhost:8080/contacts/")]
    pub server: String,

    /// Treat the service as unreachable; writes are queued locally
    #[arg(long)]
    pub offline: bool,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List contacts ordered by name
    List {
        /// Only contacts whose name contains this, ignoring case
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one contact
    Show { id: String },
    /// Create a contact
    Add {
        #[arg(long)]
        name: String,
        #[command(flatten)]
        fields: ContactFields,
    },
    /// Change fields of an existing contact
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: ContactFields,
    },
    /// Delete a contact
    Remove { id: String },
    /// Send queued changes to the server
    Sync,
    /// Ask the server to generate contacts
    Seed {
        #[arg(long)]
        count: Option<usize>,
    },
    /// Show queued changes
    Pending {
        /// Drop every queued change without sending it
        #[arg(long)]
        discard: bool,
    },
}

/// Optional contact fields shared by `add` and `edit`.
#[derive(Args, Debug, Default, Clone)]
pub struct ContactFields {
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub cell: Option<String>,
    #[arg(long)]
    pub age: Option<u32>,
    /// Image file to attach
    #[arg(long)]
    pub image: Option<PathBuf>,
}

impl ContactFields {
    async fn apply(self, mut contact: Contact) -> Result<Contact> {
        if let Some(address) = self.address {
            contact.full_address = address;
        }
        if let Some(email) = self.email {
            contact.email = email;
        }
        if let Some(phone) = self.phone {
            contact.phone = phone;
        }
        if let Some(cell) = self.cell {
            contact.cell = cell;
        }
        if let Some(age) = self.age {
            contact.age = Some(age);
        }
        if let Some(path) = self.image {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read image {}", path.display()))?;
            contact = contact.with_image(bytes, media_type(&path));
        }
        Ok(contact)
    }
}

fn media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// A contact as printed: the image is summarized by its size.
#[derive(Debug, Serialize)]
pub struct ContactView {
    pub id: String,
    pub name: String,
    pub full_address: String,
    pub email: String,
    pub phone: String,
    pub cell: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    pub image_bytes: usize,
    pub image_type: String,
}

impl From<&Contact> for ContactView {
    fn from(c: &Contact) -> Self {
        Self {
            id: c.id.to_string(),
            name: c.name.clone(),
            full_address: c.full_address.clone(),
            email: c.email.clone(),
            phone: c.phone.clone(),
            cell: c.cell.clone(),
            registration_date: c.registration_date,
            age: c.age,
            image_bytes: c.image.as_ref().map_or(0, Vec::len),
            image_type: c.image_type.clone(),
        }
    }
}

/// A queued change as printed.
#[derive(Debug, Serialize)]
pub struct PendingView {
    pub id: String,
    pub kind: ChangeKind,
    pub revision: u64,
    pub queued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&ChangeEntry> for PendingView {
    fn from(e: &ChangeEntry) -> Self {
        Self {
            id: e.id.to_string(),
            kind: e.kind(),
            revision: e.revision,
            queued_at: e.queued_at,
            name: e.op.snapshot().map(|c| c.name.clone()),
        }
    }
}

fn contacts_json(contacts: &[Contact]) -> Result<Value> {
    let views: Vec<ContactView> = contacts.iter().map(ContactView::from).collect();
    Ok(serde_json::to_value(views)?)
}

fn contact_json(contact: &Contact) -> Result<Value> {
    Ok(serde_json::to_value(ContactView::from(contact))?)
}

/// Opens the local store and builds an HTTP-backed engine from the flags.
pub fn open_engine(cli: &Cli) -> Result<SyncEngine> {
    let store = LocalStore::open(&cli.db)
        .with_context(|| format!("Failed to open database {}", cli.db.display()))?;
    let config = SyncConfig {
        remote: RemoteConfig {
            base_url: cli.server.clone(),
            timeout_secs: cli.timeout,
            ..Default::default()
        },
        ..Default::default()
    };
    let engine = SyncEngine::with_http(store, Connectivity::new(!cli.offline), config)
        .context("Failed to set up the remote client")?;
    Ok(engine)
}

/// Runs one command and returns what it printed.
pub async fn run(cli: Cli) -> Result<Value> {
    let engine = open_engine(&cli)?;
    debug!("Running {:?}", cli.command);

    match cli.command {
        Command::List { search } => {
            let all = engine.get_all().await?;
            match search {
                Some(term) => contacts_json(&engine.search(&term)?),
                None => contacts_json(&all),
            }
        }
        Command::Show { id } => {
            let contact = engine
                .get_by_id(&ContactId::new(&id))
                .await
                .with_context(|| format!("Contact {id} not found"))?;
            contact_json(&contact)
        }
        Command::Add { name, fields } => {
            let contact = fields.apply(Contact::new(name)).await?;
            let created = engine.create(contact).await.context("Failed to add contact")?;
            contact_json(&created)
        }
        Command::Edit { id, name, fields } => {
            let mut contact = engine
                .get_by_id(&ContactId::new(&id))
                .await
                .with_context(|| format!("Contact {id} not found"))?;
            if let Some(name) = name {
                contact.name = name;
            }
            let contact = fields.apply(contact).await?;
            let updated = engine.update(contact).await.context("Failed to edit contact")?;
            contact_json(&updated)
        }
        Command::Remove { id } => {
            engine
                .delete(&ContactId::new(&id))
                .await
                .context("Failed to remove contact")?;
            Ok(json!({ "removed": id }))
        }
        Command::Sync => match engine.sync().await? {
            DrainOutcome::AlreadyDraining => Ok(json!({ "status": "already draining" })),
            DrainOutcome::Completed(report) => Ok(serde_json::to_value(report)?),
        },
        Command::Seed { count } => {
            let count = count.unwrap_or(engine.config().batch_seed_size);
            contacts_json(&engine.seed(count).await?)
        }
        Command::Pending { discard: true } => {
            let dropped = engine.store().changes().clear()?;
            Ok(json!({ "discarded": dropped }))
        }
        Command::Pending { discard: false } => {
            let views: Vec<PendingView> = engine.pending()?.iter().map(PendingView::from).collect();
            Ok(serde_json::to_value(views)?)
        }
    }
}
