//! Configuration for the remote client and the sync engine.

use serde::{Deserialize, Serialize};

/// Where and how to reach the remote contacts service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the contacts collection (e.g. `http://localhost:8080/contacts/`).
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/contacts/".to_string(),
            timeout_secs: 30,
            user_agent: format!("contactsync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Configuration for the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote service settings.
    #[serde(flatten)]
    pub remote: RemoteConfig,
    /// Drain the change log automatically when connectivity returns.
    pub sync_on_reconnect: bool,
    /// How many contacts a seed request asks the server to generate.
    pub batch_seed_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            sync_on_reconnect: true,
            batch_seed_size: 10,
        }
    }
}
