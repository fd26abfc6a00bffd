//! The contact record.

use crate::ContactId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A contact as held in the local entity store and exchanged with the
/// remote service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Contact {
    /// Identifier; empty until the contact has been written once.
    pub id: ContactId,
    pub name: String,
    pub full_address: String,
    pub email: String,
    pub phone: String,
    pub cell: String,
    #[serde(default)]
    pub registration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub age: Option<u32>,
    /// Raw image bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Vec<u8>>,
    /// Media type of `image`, empty when there is no image.
    #[serde(default)]
    pub image_type: String,
}

impl Contact {
    /// Creates a contact with only a name set and no identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<ContactId>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.full_address = address.into();
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    #[must_use]
    pub fn with_cell(mut self, cell: impl Into<String>) -> Self {
        self.cell = cell.into();
        self
    }

    #[must_use]
    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    #[must_use]
    pub fn with_registration_date(mut self, date: DateTime<Utc>) -> Self {
        self.registration_date = Some(date);
        self
    }

    /// Attaches an image payload together with its media type.
    #[must_use]
    pub fn with_image(mut self, bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        self.image = Some(bytes);
        self.image_type = media_type.into();
        self
    }

    /// Case-folded name used for ordering.
    #[must_use]
    pub fn sort_key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Orders contacts by name ascending, ignoring case, with the identifier
    /// as tie-breaker so the order is total.
    #[must_use]
    pub fn cmp_by_name(a: &Self, b: &Self) -> Ordering {
        a.sort_key()
            .cmp(&b.sort_key())
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    }

    /// Returns true if the name contains `term`, ignoring case.
    #[must_use]
    pub fn matches_name(&self, term: &str) -> bool {
        term.is_empty() || self.sort_key().contains(&term.to_lowercase())
    }
}
