//! Scripted in-memory remote used by the engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use contactsync_storage::LocalStore;
use contactsync_sync::{Connectivity, RemoteClient, SyncConfig, SyncEngine, SyncError, SyncResult};
use contactsync_types::{Contact, ContactId};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// A request the engine made.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Call {
    List,
    Get(String),
    /// Carries the contact's name; the id sent is not meaningful.
    Create(String),
    Update(String),
    Delete(String),
    Batch(usize),
}

#[derive(Default)]
struct State {
    contacts: BTreeMap<ContactId, Contact>,
    calls: Vec<Call>,
    failing: HashSet<Call>,
    unreachable: bool,
    id_prefix: String,
    next_id: u64,
}

/// Holds write calls until released.
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

pub struct MockRemote {
    state: Mutex<State>,
    gate: Mutex<Option<Gate>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                id_prefix: "srv-".to_string(),
                next_id: 1,
                ..State::default()
            }),
            gate: Mutex::new(None),
        })
    }

    /// Next created contact gets `<prefix><next>`.
    pub fn assign_ids(&self, prefix: &str, next: u64) {
        let mut state = self.state.lock().unwrap();
        state.id_prefix = prefix.to_string();
        state.next_id = next;
    }

    pub fn insert(&self, contact: Contact) {
        self.state
            .lock()
            .unwrap()
            .contacts
            .insert(contact.id.clone(), contact);
    }

    pub fn contact(&self, id: &str) -> Option<Contact> {
        self.state
            .lock()
            .unwrap()
            .contacts
            .get(&ContactId::new(id))
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut all: Vec<Contact> = self.state.lock().unwrap().contacts.values().cloned().collect();
        all.sort_by(Contact::cmp_by_name);
        all.into_iter().map(|c| c.name).collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Makes `call` answer with a 500 until [`heal`](Self::heal).
    pub fn fail(&self, call: Call) {
        self.state.lock().unwrap().failing.insert(call);
    }

    pub fn heal(&self) {
        self.state.lock().unwrap().failing.clear();
    }

    /// Every call fails as if the network were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    /// Parks every write call until `release` is notified.
    pub fn hold_writes(&self) -> Gate {
        let gate = Gate {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        *self.gate.lock().unwrap() = Some(Gate {
            entered: gate.entered.clone(),
            release: gate.release.clone(),
        });
        gate
    }

    fn record(&self, call: Call) -> SyncResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.clone());
        if state.unreachable {
            return Err(SyncError::Network("connection refused".to_string()));
        }
        if state.failing.contains(&call) {
            return Err(SyncError::Remote {
                status: 500,
                message: "scripted failure".to_string(),
            });
        }
        Ok(())
    }

    async fn wait_gate(&self) {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }
}

#[async_trait]
impl RemoteClient for MockRemote {
    async fn list(&self) -> SyncResult<Vec<Contact>> {
        self.record(Call::List)?;
        let mut all: Vec<Contact> = self.state.lock().unwrap().contacts.values().cloned().collect();
        all.sort_by(Contact::cmp_by_name);
        Ok(all)
    }

    async fn get(&self, id: &ContactId) -> SyncResult<Contact> {
        self.record(Call::Get(id.to_string()))?;
        self.state
            .lock()
            .unwrap()
            .contacts
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(id.to_string()))
    }

    async fn create(&self, contact: &Contact) -> SyncResult<Contact> {
        self.wait_gate().await;
        self.record(Call::Create(contact.name.clone()))?;
        let mut state = self.state.lock().unwrap();
        let mut created = contact.clone();
        created.id = ContactId::new(format!("{}{}", state.id_prefix, state.next_id));
        state.next_id += 1;
        state.contacts.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn update(&self, id: &ContactId, contact: &Contact) -> SyncResult<Contact> {
        self.wait_gate().await;
        self.record(Call::Update(id.to_string()))?;
        let mut state = self.state.lock().unwrap();
        if !state.contacts.contains_key(id) {
            return Err(SyncError::NotFound(id.to_string()));
        }
        let mut stored = contact.clone();
        stored.id = id.clone();
        state.contacts.insert(id.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: &ContactId) -> SyncResult<()> {
        self.wait_gate().await;
        self.record(Call::Delete(id.to_string()))?;
        self.state.lock().unwrap().contacts.remove(id);
        Ok(())
    }

    async fn create_batch(&self, count: usize) -> SyncResult<Vec<Contact>> {
        self.record(Call::Batch(count))?;
        let mut state = self.state.lock().unwrap();
        let mut created = Vec::with_capacity(count);
        for i in 0..count {
            let contact = Contact::new(format!("Generated {i:02}"))
                .with_id(format!("{}{}", state.id_prefix, state.next_id));
            state.next_id += 1;
            state.contacts.insert(contact.id.clone(), contact.clone());
            created.push(contact);
        }
        Ok(created)
    }
}

pub fn contact(id: &str, name: &str) -> Contact {
    Contact::new(name).with_id(id)
}

pub fn id(s: &str) -> ContactId {
    ContactId::new(s)
}

/// An engine over an in-memory store and the given mock.
pub fn engine(remote: &Arc<MockRemote>, online: bool) -> Arc<SyncEngine> {
    let store = LocalStore::open_in_memory().unwrap();
    let remote: Arc<dyn RemoteClient> = remote.clone();
    Arc::new(SyncEngine::new(
        store,
        remote,
        Connectivity::new(online),
        SyncConfig::default(),
    ))
}
