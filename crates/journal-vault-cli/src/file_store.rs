//! JSON-file remote store
//!
//! Stands in for the hosted backend during local use: one JSON document
//! holding every user's salt row and journal records. The whole document is
//! rewritten on each mutation via a sibling temp file and a rename.

use async_trait::async_trait;
use journal_vault::{Error, JournalRecord, RemoteStore, Result, VaultSalt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    salts: HashMap<String, VaultSalt>,
    #[serde(default)]
    records: HashMap<String, Vec<JournalRecord>>,
}

/// Remote store persisted to a single JSON file
pub struct FileRemoteStore {
    path: PathBuf,
    doc: RwLock<StoreDocument>,
}

impl FileRemoteStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let doc = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| Error::RemoteReadFailure(format!("{}: {}", path.display(), e)))?;
            serde_json::from_str(&raw)?
        } else {
            StoreDocument::default()
        };
        debug!(path = %path.display(), "Opened store file");
        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a new record as-is
    pub fn insert_record(&self, record: JournalRecord) -> Result<()> {
        let mut doc = self.doc.write();
        let rows = doc.records.entry(record.user_id.clone()).or_default();
        if rows.iter().any(|r| r.id == record.id) {
            return Err(Error::RemoteWriteFailure(format!(
                "record {} already exists",
                record.id
            )));
        }
        let (user_id, id) = (record.user_id.clone(), record.id.clone());
        rows.push(record);

        if let Err(e) = self.persist(&doc) {
            if let Some(rows) = doc.records.get_mut(&user_id) {
                rows.retain(|r| r.id != id);
            }
            return Err(e);
        }
        Ok(())
    }

    fn persist(&self, doc: &StoreDocument) -> Result<()> {
        let json = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| Error::RemoteWriteFailure(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl RemoteStore for FileRemoteStore {
    async fn fetch_salt(&self, user_id: &str) -> Result<Option<VaultSalt>> {
        Ok(self.doc.read().salts.get(user_id).cloned())
    }

    async fn store_salt(&self, user_id: &str, salt: &VaultSalt) -> Result<()> {
        let mut doc = self.doc.write();
        if doc.salts.contains_key(user_id) {
            return Err(Error::AlreadyInitialized);
        }
        doc.salts.insert(user_id.to_string(), salt.clone());
        if let Err(e) = self.persist(&doc) {
            doc.salts.remove(user_id);
            return Err(e);
        }
        Ok(())
    }

    async fn has_unencrypted_records(&self, user_id: &str) -> Result<bool> {
        Ok(self
            .doc
            .read()
            .records
            .get(user_id)
            .is_some_and(|rows| rows.iter().any(|r| !r.has_blob())))
    }

    async fn sample_encrypted_blobs(&self, user_id: &str, limit: usize) -> Result<Vec<String>> {
        Ok(self
            .doc
            .read()
            .records
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
        Ok(self.doc.read().records.get(user_id).cloned().unwrap_or_default())
    }

    async fn update_record(&self, user_id: &str, record: &JournalRecord) -> Result<()> {
        let mut doc = self.doc.write();
        let row = doc
            .records
            .get_mut(user_id)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == record.id))
            .ok_or_else(|| Error::RemoteWriteFailure(format!("record {} not found", record.id)))?;
        let previous = std::mem::replace(row, record.clone());

        if let Err(e) = self.persist(&doc) {
            if let Some(row) = doc
                .records
                .get_mut(user_id)
                .and_then(|rows| rows.iter_mut().find(|r| r.id == record.id))
            {
                *row = previous;
            }
            return Err(e);
        }
        Ok(())
    }
}
