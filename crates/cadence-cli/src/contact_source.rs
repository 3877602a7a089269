use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use cadence_core::{Contact, ContactId};
use cadence_pipeline::{ContactSource, PipelineError};

/// A [`ContactSource`] backed by a JSON array of [`Contact`] records read
/// once from disk (§6's "Contact input" interface).
pub struct JsonFileContactSource {
    contacts: HashMap<ContactId, Contact>,
}

impl JsonFileContactSource {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read contacts file {}: {e}", path.as_ref().display()))?;
        let records: Vec<Contact> = serde_json::from_str(&content)?;
        let contacts = records.into_iter().map(|c| (c.id.clone(), c)).collect();
        Ok(Self { contacts })
    }

    #[must_use]
    pub fn all(&self) -> Vec<Contact> {
        self.contacts.values().cloned().collect()
    }
}

#[async_trait]
impl ContactSource for JsonFileContactSource {
    async fn get_contact(&self, contact_id: &ContactId) -> Result<Contact, PipelineError> {
        self.contacts
            .get(contact_id)
            .cloned()
            .ok_or_else(|| PipelineError::ContactNotFound(contact_id.to_string()))
    }
}
