//! Remote store collaborator
//!
//! The vault does not own storage; it talks to whatever backend holds the
//! per-user salt row and the journal records through [`RemoteStore`]. The
//! only cryptographic material the vault ever hands to it is the salt record.
//! Retries are the implementation's business.

use crate::kdf::VaultSalt;
use crate::record::JournalRecord;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Remote store abstraction
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the user's salt row, if setup has run
    async fn fetch_salt(&self, user_id: &str) -> Result<Option<VaultSalt>>;

    /// Persist the user's salt row
    async fn store_salt(&self, user_id: &str, salt: &VaultSalt) -> Result<()>;

    /// Whether any of the user's records lacks a blob
    async fn has_unencrypted_records(&self, user_id: &str) -> Result<bool>;

    /// Up to `limit` stored blobs for the user, used to verify a password at unlock
    async fn sample_encrypted_blobs(&self, user_id: &str, limit: usize) -> Result<Vec<String>>;

    /// All of the user's records, oldest first
    async fn fetch_records(&self, user_id: &str) -> Result<Vec<JournalRecord>>;

    /// Replace a record wholesale
    async fn update_record(&self, user_id: &str, record: &JournalRecord) -> Result<()>;
}

/// In-memory store for tests and local tooling
#[derive(Default)]
pub struct MemoryRemoteStore {
    salts: RwLock<HashMap<String, VaultSalt>>,
    records: RwLock<HashMap<String, Vec<JournalRecord>>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryRemoteStore {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (for testing)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent read fail (for testing)
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Insert a record directly, bypassing the vault
    pub fn insert_record(&self, record: JournalRecord) {
        self.records
            .write()
            .entry(record.user_id.clone())
            .or_default()
            .push(record);
    }

    /// Snapshot of a single record
    pub fn record(&self, user_id: &str, record_id: &str) -> Option<JournalRecord> {
        self.records
            .read()
            .get(user_id)
            .and_then(|rows| rows.iter().find(|r| r.id == record_id).cloned())
    }

    /// Raw salt row, if any
    pub fn salt(&self, user_id: &str) -> Option<VaultSalt> {
        self.salts.read().get(user_id).cloned()
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::RemoteReadFailure("store unavailable".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::RemoteWriteFailure("store rejected write".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch_salt(&self, user_id: &str) -> Result<Option<VaultSalt>> {
        self.check_read()?;
        Ok(self.salts.read().get(user_id).cloned())
    }

    async fn store_salt(&self, user_id: &str, salt: &VaultSalt) -> Result<()> {
        self.check_write()?;
        let mut salts = self.salts.write();
        // Salt rows are immutable once written
        if salts.contains_key(user_id) {
            return Err(Error::AlreadyInitialized);
        }
        salts.insert(user_id.to_string(), salt.clone());
        Ok(())
    }

    async fn has_unencrypted_records(&self, user_id: &str) -> Result<bool> {
        self.check_read()?;
        Ok(self
            .records
            .read()
            .get(user_id)
            .is_some_and(|rows| rows.iter().any(|r| !r.has_blob())))
    }

    async fn sample_encrypted_blobs(&self, user_id: &str, limit: usize) -> Result<Vec<String>> {
        self.check_read()?;
        Ok(self
            .records
            .read()
            .get(user_id)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.has_blob())
                    .filter_map(|r| r.encrypted_data.clone())
                    .take(limit)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_records(&self, user_id: &str) -> Result<Vec<JournalRecord>> {
        self.check_read()?;
        Ok(self.records.read().get(user_id).cloned().unwrap_or_default())
    }

    async fn update_record(&self, user_id: &str, record: &JournalRecord) -> Result<()> {
        self.check_write()?;
        let mut records = self.records.write();
        let row = records
            .get_mut(user_id)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == record.id))
            .ok_or_else(|| Error::RemoteWriteFailure(format!("record {} not found", record.id)))?;
        *row = record.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::SensitiveFieldBundle;

    #[tokio::test]
    async fn test_salt_row_is_write_once() {
        let store = MemoryRemoteStore::new();
        let salt = VaultSalt::generate(32, 1);

        store.store_salt("u1", &salt).await.unwrap();
        assert_eq!(store.fetch_salt("u1").await.unwrap(), Some(salt));
        assert!(matches!(
            store.store_salt("u1", &VaultSalt::generate(32, 1)).await,
            Err(Error::AlreadyInitialized)
        ));
        assert_eq!(store.fetch_salt("u2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryRemoteStore::new();
        store.set_fail_writes(true);
        assert!(matches!(
            store.store_salt("u1", &VaultSalt::generate(32, 1)).await,
            Err(Error::RemoteWriteFailure(_))
        ));
        assert!(store.salt("u1").is_none());

        store.set_fail_reads(true);
        assert!(matches!(
            store.fetch_records("u1").await,
            Err(Error::RemoteReadFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_unencrypted_scan_and_sample() {
        let store = MemoryRemoteStore::new();
        assert!(!store.has_unencrypted_records("u1").await.unwrap());

        store.insert_record(JournalRecord::new("r1", "u1", SensitiveFieldBundle::default()));
        assert!(store.has_unencrypted_records("u1").await.unwrap());
        assert!(store.sample_encrypted_blobs("u1", 5).await.unwrap().is_empty());

        let mut encrypted = JournalRecord::new("r1", "u1", SensitiveFieldBundle::placeholder());
        encrypted.encrypted_data = Some("{\"iv\":\"\",\"ciphertext\":\"\"}".to_string());
        store.update_record("u1", &encrypted).await.unwrap();

        assert!(!store.has_unencrypted_records("u1").await.unwrap());
        assert_eq!(store.sample_encrypted_blobs("u1", 5).await.unwrap().len(), 1);
        assert!(store.sample_encrypted_blobs("u1", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_record_fails() {
        let store = MemoryRemoteStore::new();
        let record = JournalRecord::new("missing", "u1", SensitiveFieldBundle::default());
        assert!(matches!(
            store.update_record("u1", &record).await,
            Err(Error::RemoteWriteFailure(_))
        ));
    }
}
