//! Journal record as held by the remote store
//!
//! A record is either legacy (sensitive columns hold real plaintext, no blob)
//! or encrypted (sensitive columns hold placeholders, `encrypted_data` holds
//! the blob). The sensitive columns are the [`SensitiveFieldBundle`] fields,
//! flattened into the record.

use crate::bundle::SensitiveFieldBundle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Encryption status of a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Pre-encryption row with plaintext sensitive columns
    Legacy,
    /// Blob present; sensitive columns are placeholders
    Encrypted,
}

/// Journal record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    /// Record id
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last edit timestamp
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// When the logged session took place
    #[serde(default)]
    pub consumed_at: Option<DateTime<Utc>>,
    /// Sensitive columns (plaintext or placeholders)
    #[serde(flatten)]
    pub fields: SensitiveFieldBundle,
    /// Serialized [`EncryptedBlob`](crate::EncryptedBlob)
    #[serde(default)]
    pub encrypted_data: Option<String>,
    /// Key version of the blob
    #[serde(default)]
    pub encryption_version: Option<u32>,
}

impl JournalRecord {
    /// New unencrypted record
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, fields: SensitiveFieldBundle) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            created_at: Utc::now(),
            updated_at: None,
            consumed_at: None,
            fields,
            encrypted_data: None,
            encryption_version: None,
        }
    }

    /// Blob presence; an empty column counts as absent
    pub fn has_blob(&self) -> bool {
        self.encrypted_data
            .as_deref()
            .is_some_and(|data| !data.trim().is_empty())
    }

    /// Current state
    pub fn state(&self) -> RecordState {
        if self.has_blob() {
            RecordState::Encrypted
        } else {
            RecordState::Legacy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_row_deserializes_with_flattened_columns() {
        let row = r#"{
            "id": "r1",
            "user_id": "u1",
            "created_at": "2024-03-01T10:00:00Z",
            "strain_name": "Blue Dream",
            "after_mood": 8,
            "notes_after": null
        }"#;
        let record: JournalRecord = serde_json::from_str(row).unwrap();

        assert_eq!(record.fields.strain_name, "Blue Dream");
        assert_eq!(record.fields.after_mood, Some(8));
        assert_eq!(record.fields.notes_after, "");
        assert_eq!(record.state(), RecordState::Legacy);
    }

    #[test]
    fn test_empty_blob_column_is_legacy() {
        let mut record = JournalRecord::new("r1", "u1", SensitiveFieldBundle::default());
        record.encrypted_data = Some("  ".to_string());
        assert!(!record.has_blob());

        record.encrypted_data = Some("{}".to_string());
        assert_eq!(record.state(), RecordState::Encrypted);
    }

    #[test]
    fn test_record_roundtrips_through_json() {
        let record = JournalRecord::new(
            "r1",
            "u1",
            SensitiveFieldBundle {
                strain_name: "Harlequin".to_string(),
                activities: vec!["walk".to_string()],
                ..Default::default()
            },
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: JournalRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
