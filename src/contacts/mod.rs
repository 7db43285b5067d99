//! Emergency contacts. Kept in a JSON file in the local data directory and
//! never sent to the API.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::ClientError;
use crate::session::write_json_atomic;
use crate::validation::{self, FieldErrors};

pub type ContactId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub id: ContactId,
    pub user_id: String,
    #[serde(default)]
    pub relation: String,
    pub contact_name: String,
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ContactForm {
    pub user_id: String,
    pub relation: String,
    pub contact_name: String,
    pub phone_number: String,
    pub email: Option<String>,
}

impl ContactForm {
    pub fn validate(&self) -> Result<(), ClientError> {
        let mut errors = FieldErrors::new();
        errors
            .check("user_id", validation::validate_required(&self.user_id, "User ID"))
            .check(
                "contact_name",
                validation::validate_required(&self.contact_name, "Contact name"),
            )
            .check(
                "phone_number",
                validation::validate_required(&self.phone_number, "Phone number"),
            )
            .check("email", validation::validate_optional_email(&self.email));
        errors.finish()
    }
}

/// Contacts on disk at one path, loaded eagerly and saved after each change.
#[derive(Debug)]
pub struct ContactBook {
    path: PathBuf,
    contacts: Vec<EmergencyContact>,
}

impl ContactBook {
    /// Load the book at `path`. A missing file is an empty book.
    pub fn open(path: &Path) -> Result<Self, ClientError> {
        let contacts = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    warn!(path = %path.display(), error = %e, "Contacts file is not valid JSON");
                    ClientError::Storage(format!("{}: {}", path.display(), e))
                })?
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            contacts,
        })
    }

    pub fn list(&self) -> &[EmergencyContact] {
        &self.contacts
    }

    pub fn for_user<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a EmergencyContact> {
        self.contacts.iter().filter(move |c| c.user_id == user_id)
    }

    /// Validate and store a new contact. Ids are one more than the highest
    /// id in the book, so they are never reused while the book is non-empty.
    pub fn add(&mut self, form: ContactForm) -> Result<&EmergencyContact, ClientError> {
        form.validate()?;

        let id = self.contacts.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        let contact = EmergencyContact {
            id,
            user_id: form.user_id.trim().to_string(),
            relation: form.relation.trim().to_string(),
            contact_name: form.contact_name.trim().to_string(),
            phone_number: form.phone_number.trim().to_string(),
            email: form
                .email
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
        };

        self.contacts.push(contact);
        self.save()?;
        info!(contact_id = id, "Emergency contact added");

        let idx = self.contacts.len() - 1;
        Ok(&self.contacts[idx])
    }

    pub fn remove(&mut self, id: ContactId) -> Result<Option<EmergencyContact>, ClientError> {
        let Some(pos) = self.contacts.iter().position(|c| c.id == id) else {
            return Ok(None);
        };
        let removed = self.contacts.remove(pos);
        self.save()?;
        info!(contact_id = id, "Emergency contact removed");
        Ok(Some(removed))
    }

    fn save(&self) -> Result<(), ClientError> {
        write_json_atomic(&self.path, &self.contacts)
    }
}
