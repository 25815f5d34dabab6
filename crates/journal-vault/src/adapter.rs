//! Journal encryption adapter
//!
//! The boundary journal CRUD, analytics and the coach go through. Writes are
//! encrypted and sanitized before they reach the store; reads are decrypted
//! and merged back. Reads never fail: when the vault is locked, or a blob is
//! bad, the record comes back exactly as stored, placeholders and all.

use crate::blob::EncryptedBlob;
use crate::bundle::SensitiveFieldBundle;
use crate::engine;
use crate::record::JournalRecord;
use crate::vault::{VaultController, VaultSession};
use crate::{Error, Result};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of encrypting one record
#[derive(Debug, Clone)]
pub struct EncryptedEntry {
    /// Serialized blob for the `encrypted_data` column
    pub encrypted_data: String,
    /// Key version of the blob
    pub encryption_version: u32,
    /// The record to persist: placeholders in every sensitive column
    pub sanitized_entry: JournalRecord,
}

/// Maps journal records to and from encrypted blobs
#[derive(Clone)]
pub struct JournalEncryptionAdapter {
    vault: Arc<VaultController>,
}

impl JournalEncryptionAdapter {
    /// Create adapter over the session's vault
    pub fn new(vault: Arc<VaultController>) -> Self {
        Self { vault }
    }

    /// The vault this adapter encrypts with
    pub fn vault(&self) -> &Arc<VaultController> {
        &self.vault
    }

    /// Sensitive columns of a record, absent values already defaulted
    pub fn extract_sensitive_fields(record: &JournalRecord) -> SensitiveFieldBundle {
        record.fields.clone()
    }

    /// Blob presence
    pub fn is_entry_encrypted(record: &JournalRecord) -> bool {
        record.has_blob()
    }

    /// Sensitive writes can proceed without prompting
    pub fn can_encrypt(&self) -> bool {
        self.vault.can_encrypt()
    }

    /// Consumers should prompt for the password before sensitive reads/writes
    pub fn needs_unlock(&self) -> bool {
        self.vault.needs_unlock()
    }

    /// Encrypt a record's sensitive fields and sanitize its columns.
    ///
    /// `Err(EncryptionUnavailable)` means the vault is locked or not set up;
    /// the caller should prompt rather than persist plaintext.
    pub fn encrypt_entry(&self, record: &JournalRecord) -> Result<EncryptedEntry> {
        let session = self
            .vault
            .session()
            .ok_or_else(|| Error::EncryptionUnavailable("Vault is locked".to_string()))?;

        // An encrypted row that was never decrypted only holds placeholders;
        // encrypting those would replace the real data.
        if record.has_blob() && record.fields.is_placeholder() {
            return Err(Error::Validation(format!(
                "Record {} holds placeholders; decrypt it before re-encrypting",
                record.id
            )));
        }

        let bundle = Self::extract_sensitive_fields(record);
        let blob = engine::encrypt(session.key(), &bundle, session.key_version())?;
        let encrypted_data = blob.to_json_string()?;

        let mut sanitized_entry = record.clone();
        sanitized_entry.fields = SensitiveFieldBundle::placeholder();
        sanitized_entry.encrypted_data = Some(encrypted_data.clone());
        sanitized_entry.encryption_version = Some(session.key_version());

        debug!(event = "entry_encrypted", record_id = %record.id, "Entry encrypted");

        Ok(EncryptedEntry {
            encrypted_data,
            encryption_version: session.key_version(),
            sanitized_entry,
        })
    }

    /// Decrypt a record, surfacing the failure reason.
    ///
    /// Records without a blob are returned unchanged.
    pub fn try_decrypt_entry(&self, record: &JournalRecord) -> Result<JournalRecord> {
        if !record.has_blob() {
            return Ok(record.clone());
        }
        let session = self
            .vault
            .session()
            .ok_or_else(|| Error::EncryptionUnavailable("Vault is locked".to_string()))?;

        decrypt_with(&session, record)
    }

    /// Decrypt a record; on any failure return it unchanged.
    pub fn decrypt_entry(&self, record: &JournalRecord) -> JournalRecord {
        match self.try_decrypt_entry(record) {
            Ok(decrypted) => decrypted,
            Err(e) => {
                log_passthrough(record, &e);
                record.clone()
            }
        }
    }

    /// Batch decrypt, order preserved. A failing record is passed through
    /// unchanged while the rest decrypt.
    pub fn decrypt_entries(&self, records: &[JournalRecord]) -> Vec<JournalRecord> {
        let Some(session) = self.vault.session() else {
            debug!(
                event = "entries_passthrough_locked",
                count = records.len(),
                "Vault locked; returning entries unchanged"
            );
            return records.to_vec();
        };

        records
            .par_iter()
            .map(|record| {
                if !record.has_blob() {
                    return record.clone();
                }
                decrypt_with(&session, record).unwrap_or_else(|e| {
                    log_passthrough(record, &e);
                    record.clone()
                })
            })
            .collect()
    }
}

fn decrypt_with(session: &VaultSession, record: &JournalRecord) -> Result<JournalRecord> {
    let data = record.encrypted_data.as_deref().unwrap_or_default();
    let blob = EncryptedBlob::parse(data)?;
    if blob.version() > session.key_version() {
        return Err(Error::DecryptionFailure(format!(
            "Blob version {} is newer than key version {}",
            blob.version(),
            session.key_version()
        )));
    }

    let bundle = engine::decrypt(session.key(), &blob)?;
    let mut merged = record.clone();
    merged.fields = bundle;
    Ok(merged)
}

fn log_passthrough(record: &JournalRecord, error: &Error) {
    if error.needs_unlock() {
        debug!(
            event = "entry_passthrough_locked",
            record_id = %record.id,
            "Vault locked; entry returned unchanged"
        );
    } else {
        warn!(
            event = "entry_decrypt_failed",
            record_id = %record.id,
            category = %error.category(),
            error = %error,
            "Entry left in placeholder state"
        );
    }
}
