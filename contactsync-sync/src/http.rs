//! HTTP implementation of [`RemoteClient`].
//!
//! Speaks the contacts REST dialect: JSON records keyed by `_id` with
//! camelCase fields and images serialized as buffer objects, and
//! `multipart/form-data` bodies for create/update.

use crate::config::RemoteConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contactsync_types::{Contact, ContactId};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The server generates this many contacts per batch request.
pub const SERVER_BATCH_SIZE: usize = 10;

/// Contact record as the server returns it.
#[derive(Debug, Deserialize)]
struct WireContact {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "fullAddress", default)]
    full_address: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    cell: Option<String>,
    #[serde(rename = "registrationDate", default)]
    registration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    age: Option<f64>,
    #[serde(default)]
    image: Option<WireImage>,
    #[serde(rename = "imageType", default)]
    image_type: Option<String>,
}

/// Image bytes, either as a serialized buffer object
/// (`{"type": "Buffer", "data": [..]}`) or a bare byte array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireImage {
    Buffer { data: Vec<u8> },
    Bytes(Vec<u8>),
}

impl From<WireContact> for Contact {
    fn from(w: WireContact) -> Self {
        let image = w.image.map(|img| match img {
            WireImage::Buffer { data } | WireImage::Bytes(data) => data,
        });
        Contact {
            id: ContactId::new(w.id),
            name: w.name.unwrap_or_default(),
            full_address: w.full_address.unwrap_or_default(),
            email: w.email.unwrap_or_default(),
            phone: w.phone.unwrap_or_default(),
            cell: w.cell.unwrap_or_default(),
            registration_date: w.registration_date,
            age: w
                .age
                .filter(|a| a.is_finite() && *a >= 0.0)
                .map(|a| a.round() as u32),
            image: image.filter(|bytes| !bytes.is_empty()),
            image_type: w.image_type.unwrap_or_default(),
        }
    }
}

/// Error body the server sends alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
struct WireErrorBody {
    message: Option<String>,
    error: Option<serde_json::Value>,
}

/// [`RemoteClient`] backed by reqwest.
pub struct HttpRemoteClient {
    config: RemoteConfig,
    client: Client,
}

impl HttpRemoteClient {
    /// Creates a client for the service at `config.base_url`.
    pub fn new(config: RemoteConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SyncError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    /// Returns the configuration in use.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn collection_url(&self) -> String {
        self.config.base_url.trim_end_matches('/').to_string()
    }

    fn record_url(&self, id: &ContactId) -> String {
        format!("{}/{}", self.collection_url(), urlencoding::encode(id.as_str()))
    }

    fn batch_url(&self) -> String {
        format!("{}/10Contacts", self.collection_url())
    }

    /// Builds the multipart body shared by create and update.
    fn form(contact: &Contact, include_registration: bool) -> Form {
        let mut form = Form::new()
            .text("name", contact.name.clone())
            .text("fullAddress", contact.full_address.clone())
            .text("email", contact.email.clone())
            .text("phone", contact.phone.clone())
            .text("cell", contact.cell.clone())
            .text(
                "age",
                contact.age.map(|a| a.to_string()).unwrap_or_default(),
            )
            .text("imageType", contact.image_type.clone());

        if include_registration {
            let date = contact.registration_date.unwrap_or_else(Utc::now);
            form = form.text("registrationDate", date.to_rfc3339());
        }

        if let Some(bytes) = contact.image.clone() {
            let media_type = if contact.image_type.is_empty() {
                "application/octet-stream"
            } else {
                contact.image_type.as_str()
            };
            let part = match Part::bytes(bytes.clone()).file_name("image").mime_str(media_type) {
                Ok(part) => part,
                Err(_) => {
                    debug!("Unusable image type {:?} for {}", media_type, contact.id);
                    Part::bytes(bytes).file_name("image")
                }
            };
            form = form.part("image", part);
        }
        form
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> SyncResult<Response> {
        request
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("{what} failed: {e}")))
    }

    /// Maps a non-success status to the error taxonomy.
    async fn check(response: Response, what: &str) -> SyncResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<WireErrorBody>(&body)
            .ok()
            .and_then(|b| {
                b.message
                    .or_else(|| b.error.map(|e| e.to_string()))
            })
            .unwrap_or(body);

        if status == StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound(what.to_string()));
        }
        Err(SyncError::Remote {
            status: status.as_u16(),
            message,
        })
    }

    async fn read_contact(response: Response, what: &str) -> SyncResult<Contact> {
        let wire: WireContact = response
            .json()
            .await
            .map_err(|e| SyncError::Network(format!("failed to parse {what} response: {e}")))?;
        Ok(wire.into())
    }

    async fn read_contacts(response: Response, what: &str) -> SyncResult<Vec<Contact>> {
        let wire: Vec<WireContact> = response
            .json()
            .await
            .map_err(|e| SyncError::Network(format!("failed to parse {what} response: {e}")))?;
        Ok(wire.into_iter().map(Contact::from).collect())
    }

    async fn request_batch(&self) -> SyncResult<Vec<Contact>> {
        let response = self
            .send(self.client.post(self.batch_url()).json(&serde_json::json!({})), "batch create")
            .await?;
        let response = Self::check(response, "batch create").await?;
        Self::read_contacts(response, "batch create").await
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn list(&self) -> SyncResult<Vec<Contact>> {
        debug!("Listing remote contacts");
        let response = self.send(self.client.get(self.collection_url()), "list").await?;
        let response = Self::check(response, "contact list").await?;
        let mut contacts = Self::read_contacts(response, "list").await?;
        // The server already sorts; keep the order total and identical to
        // the local cache's.
        contacts.sort_by(Contact::cmp_by_name);
        Ok(contacts)
    }

    async fn get(&self, id: &ContactId) -> SyncResult<Contact> {
        debug!("Fetching remote contact {}", id);
        let response = self.send(self.client.get(self.record_url(id)), "get").await?;
        let response = Self::check(response, id.as_str()).await?;
        Self::read_contact(response, "get").await
    }

    async fn create(&self, contact: &Contact) -> SyncResult<Contact> {
        debug!("Creating remote contact {:?}", contact.name);
        let request = self
            .client
            .post(self.collection_url())
            .multipart(Self::form(contact, true));
        let response = self.send(request, "create").await?;
        let response = Self::check(response, "create").await?;
        let created = Self::read_contact(response, "create").await?;
        if created.id.is_empty() {
            return Err(SyncError::Remote {
                status: 200,
                message: "created contact has no identifier".to_string(),
            });
        }
        Ok(created)
    }

    async fn update(&self, id: &ContactId, contact: &Contact) -> SyncResult<Contact> {
        debug!("Updating remote contact {}", id);
        let request = self
            .client
            .put(self.record_url(id))
            .multipart(Self::form(contact, false));
        let response = self.send(request, "update").await?;
        let response = Self::check(response, id.as_str()).await?;
        Self::read_contact(response, "update").await
    }

    async fn delete(&self, id: &ContactId) -> SyncResult<()> {
        debug!("Deleting remote contact {}", id);
        let response = self.send(self.client.delete(self.record_url(id)), "delete").await?;
        match Self::check(response, id.as_str()).await {
            Ok(_) => Ok(()),
            Err(SyncError::NotFound(_)) => {
                debug!("Remote contact {} already gone", id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn create_batch(&self, count: usize) -> SyncResult<Vec<Contact>> {
        let mut created: Vec<Contact> = Vec::new();
        for _ in 0..count.div_ceil(SERVER_BATCH_SIZE) {
            match self.request_batch().await {
                Ok(batch) => created.extend(batch),
                Err(e) if created.is_empty() => return Err(e),
                Err(e) => {
                    warn!(
                        "Batch create stopped after {} contacts: {}",
                        created.len(),
                        e
                    );
                    break;
                }
            }
            if created.len() >= count {
                break;
            }
        }
        created.truncate(count);
        created.sort_by(Contact::cmp_by_name);
        info!("Server generated {} contacts", created.len());
        Ok(created)
    }
}
