//! Lazy migration of legacy (unencrypted) records
//!
//! Records are migrated one at a time: encrypt, then replace the stored row
//! with the sanitized row plus blob. Nothing runs automatically; the caller
//! decides when. A half-migrated set is a normal steady state, and each
//! row's blob presence is the only source of truth for its status.

use crate::adapter::JournalEncryptionAdapter;
use crate::record::{JournalRecord, RecordState};
use crate::{Error, Result};
use tracing::{info, warn};

/// Per-user migration progress
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Records examined
    pub total: usize,
    /// Records with a blob
    pub encrypted: usize,
    /// Records still holding plaintext
    pub legacy: usize,
}

impl MigrationStatus {
    /// Count record states
    pub fn scan(records: &[JournalRecord]) -> Self {
        let encrypted = records
            .iter()
            .filter(|r| r.state() == RecordState::Encrypted)
            .count();
        Self {
            total: records.len(),
            encrypted,
            legacy: records.len() - encrypted,
        }
    }

    /// Nothing left to migrate
    pub fn is_complete(&self) -> bool {
        self.legacy == 0
    }
}

/// Outcome of an explicit migration run
#[derive(Debug, Default, Clone)]
pub struct MigrationReport {
    /// Ids migrated in this run
    pub migrated: Vec<String>,
    /// Ids that already had a blob
    pub already_encrypted: Vec<String>,
    /// Ids that failed, with the reason
    pub failed: Vec<(String, String)>,
    /// The run stopped because the vault locked
    pub interrupted: bool,
}

impl JournalEncryptionAdapter {
    /// Migrate one record and persist it in place.
    ///
    /// Already-encrypted records are returned unchanged without a write. On
    /// a failed write the stored row keeps its legacy plaintext.
    pub async fn migrate_entry(&self, record: &JournalRecord) -> Result<JournalRecord> {
        let vault = self.vault();
        if record.user_id != vault.user_id() {
            return Err(Error::Validation(format!(
                "Record {} does not belong to the unlocked vault",
                record.id
            )));
        }
        if record.has_blob() {
            return Ok(record.clone());
        }

        let entry = self.encrypt_entry(record)?;
        vault
            .store()
            .update_record(vault.user_id(), &entry.sanitized_entry)
            .await
            .map_err(|e| match e {
                Error::RemoteWriteFailure(_) => e,
                other => Error::RemoteWriteFailure(other.to_string()),
            })?;

        info!(event = "entry_migrated", record_id = %record.id, "Legacy entry encrypted");
        Ok(entry.sanitized_entry)
    }

    /// Migrate `records` one by one.
    ///
    /// Per-record failures are collected; the run only stops early if the
    /// vault becomes unavailable. The vault's `needs_migration` flag is
    /// refreshed afterwards.
    pub async fn migrate_entries(&self, records: &[JournalRecord]) -> MigrationReport {
        let mut report = MigrationReport::default();

        for record in records {
            if record.has_blob() {
                report.already_encrypted.push(record.id.clone());
                continue;
            }
            match self.migrate_entry(record).await {
                Ok(_) => report.migrated.push(record.id.clone()),
                Err(e) if e.needs_unlock() => {
                    warn!(
                        event = "migration_interrupted",
                        migrated = report.migrated.len(),
                        "Vault unavailable; stopping migration"
                    );
                    report.interrupted = true;
                    break;
                }
                Err(e) => {
                    warn!(
                        event = "entry_migration_failed",
                        record_id = %record.id,
                        error = %e,
                        "Entry left unmigrated"
                    );
                    report.failed.push((record.id.clone(), e.to_string()));
                }
            }
        }

        if let Err(e) = self.vault().refresh_migration_status().await {
            warn!(error = %e, "Could not refresh migration status");
        }

        info!(
            event = "migration_run_finished",
            migrated = report.migrated.len(),
            failed = report.failed.len(),
            interrupted = report.interrupted,
            "Migration run finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::SensitiveFieldBundle;
    use crate::config::VaultConfig;
    use crate::store::{MemoryRemoteStore, RemoteStore};
    use crate::vault::VaultController;
    use std::sync::Arc;

    const PASSWORD: &str = "correct-horse-battery-staple12";

    fn legacy(id: &str) -> JournalRecord {
        JournalRecord::new(
            id,
            "u1",
            SensitiveFieldBundle {
                strain_name: format!("strain-{}", id),
                notes_before: "plaintext".to_string(),
                ..Default::default()
            },
        )
    }

    async fn setup() -> (Arc<MemoryRemoteStore>, JournalEncryptionAdapter) {
        let store = Arc::new(MemoryRemoteStore::new());
        for id in ["a", "b", "c"] {
            store.insert_record(legacy(id));
        }
        let vault = Arc::new(VaultController::new("u1", store.clone(), VaultConfig::for_test()));
        vault.setup_encryption(PASSWORD).await.unwrap();
        (store, JournalEncryptionAdapter::new(vault))
    }

    #[tokio::test]
    async fn test_migrate_entry_persists_sanitized_row() {
        let (store, adapter) = setup().await;

        let migrated = adapter.migrate_entry(&legacy("a")).await.unwrap();
        assert!(migrated.has_blob());

        let stored = store.record("u1", "a").unwrap();
        assert_eq!(stored, migrated);
        assert!(stored.fields.is_placeholder());
        assert_eq!(adapter.decrypt_entry(&stored).fields.strain_name, "strain-a");
    }

    #[tokio::test]
    async fn test_failed_write_keeps_legacy_row() {
        let (store, adapter) = setup().await;
        store.set_fail_writes(true);

        assert!(matches!(
            adapter.migrate_entry(&legacy("a")).await,
            Err(Error::RemoteWriteFailure(_))
        ));
        let stored = store.record("u1", "a").unwrap();
        assert!(!stored.has_blob());
        assert_eq!(stored.fields.notes_before, "plaintext");
    }

    #[tokio::test]
    async fn test_migrate_entries_reports_and_refreshes_flag() {
        let (store, adapter) = setup().await;
        adapter.vault().check_status().await.unwrap();
        assert!(adapter.vault().status().needs_migration);

        let records = store.fetch_records("u1").await.unwrap();
        let report = adapter.migrate_entries(&records).await;
        assert_eq!(report.migrated, ["a", "b", "c"]);
        assert!(report.failed.is_empty());
        assert!(!report.interrupted);
        assert!(!adapter.vault().status().needs_migration);

        let status = MigrationStatus::scan(&store.fetch_records("u1").await.unwrap());
        assert!(status.is_complete());
        assert_eq!(status.encrypted, 3);

        // Second run is a no-op
        let records = store.fetch_records("u1").await.unwrap();
        let report = adapter.migrate_entries(&records).await;
        assert!(report.migrated.is_empty());
        assert_eq!(report.already_encrypted.len(), 3);
    }

    #[tokio::test]
    async fn test_locked_vault_interrupts_run() {
        let (store, adapter) = setup().await;
        adapter.vault().lock();

        let records = store.fetch_records("u1").await.unwrap();
        let report = adapter.migrate_entries(&records).await;
        assert!(report.interrupted);
        assert!(report.migrated.is_empty());
        assert_eq!(MigrationStatus::scan(&store.fetch_records("u1").await.unwrap()).legacy, 3);
    }

    #[tokio::test]
    async fn test_foreign_record_rejected() {
        let (_, adapter) = setup().await;
        let mut foreign = legacy("x");
        foreign.user_id = "u2".to_string();
        assert!(matches!(
            adapter.migrate_entry(&foreign).await,
            Err(Error::Validation(_))
        ));
    }
}
