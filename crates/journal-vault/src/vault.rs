//! Vault lifecycle: setup, unlock, lock.
//!
//! One [`VaultController`] per authenticated session owns the in-memory key.
//! It is created when the user signs in and dropped (after [`logout`]) when
//! they sign out; consumers receive it by `Arc`, never through a global.
//!
//! ```text
//! Uninitialized --setup_encryption--> Unlocked
//! (session start) --check_status--> Locked      (salt row exists)
//! Locked --unlock_with_password--> Unlocked
//! Unlocked --lock--> Locked                     (idempotent)
//! ```
//!
//! Key derivation runs on the blocking pool. Every `lock()` bumps an epoch;
//! a derivation that finishes under an older epoch is dropped instead of
//! installed.
//!
//! [`logout`]: VaultController::logout

use crate::blob::EncryptedBlob;
use crate::config::VaultConfig;
use crate::engine;
use crate::kdf::{derive_key_async, validate_password, VaultKey, VaultSalt};
use crate::session_cache::SessionKeyCache;
use crate::store::RemoteStore;
use crate::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Stored blobs trial-decrypted at unlock
pub const UNLOCK_SAMPLE_SIZE: usize = 5;

/// Lock state
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// No salt known for this user
    #[default]
    Uninitialized,
    /// Salt exists, no key in memory
    Locked,
    /// Key in memory
    Unlocked,
}

/// Snapshot of the vault flags consumers decide prompts from
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VaultStatus {
    /// Lock state
    pub state: VaultState,
    /// A salt row exists for the user
    pub encryption_enabled: bool,
    /// At least one stored record has no blob
    pub needs_migration: bool,
}

/// Unlocked key material for the current session
pub struct VaultSession {
    key: VaultKey,
    key_version: u32,
}

impl VaultSession {
    pub(crate) fn key(&self) -> &VaultKey {
        &self.key
    }

    /// Version stamped on blobs written in this session
    pub fn key_version(&self) -> u32 {
        self.key_version
    }
}

#[derive(Default)]
struct Flags {
    encryption_enabled: bool,
    needs_migration: bool,
}

/// Vault lifecycle controller
pub struct VaultController {
    user_id: String,
    store: Arc<dyn RemoteStore>,
    config: VaultConfig,
    session: RwLock<Option<Arc<VaultSession>>>,
    cache: SessionKeyCache,
    salt: RwLock<Option<VaultSalt>>,
    flags: RwLock<Flags>,
    epoch: AtomicU64,
    last_activity: Mutex<Instant>,
}

impl VaultController {
    /// Create a controller for the authenticated `user_id`
    pub fn new(user_id: impl Into<String>, store: Arc<dyn RemoteStore>, config: VaultConfig) -> Self {
        Self {
            user_id: user_id.into(),
            store,
            config,
            session: RwLock::new(None),
            cache: SessionKeyCache::new(),
            salt: RwLock::new(None),
            flags: RwLock::new(Flags::default()),
            epoch: AtomicU64::new(0),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    /// Authenticated user
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Remote store collaborator
    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    /// Active configuration
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Volatile verifier cache
    pub fn session_cache(&self) -> &SessionKeyCache {
        &self.cache
    }

    /// Current lock state. An idle-expired session is locked first.
    pub fn state(&self) -> VaultState {
        if self.active_session().is_some() {
            VaultState::Unlocked
        } else if self.flags.read().encryption_enabled {
            VaultState::Locked
        } else {
            VaultState::Uninitialized
        }
    }

    /// Current flags
    pub fn status(&self) -> VaultStatus {
        let state = self.state();
        let flags = self.flags.read();
        VaultStatus {
            state,
            encryption_enabled: flags.encryption_enabled,
            needs_migration: flags.needs_migration,
        }
    }

    /// True when sensitive writes can be encrypted right now
    pub fn can_encrypt(&self) -> bool {
        self.active_session().is_some()
    }

    /// True when the user has a vault but must enter their password
    pub fn needs_unlock(&self) -> bool {
        let enabled = self.flags.read().encryption_enabled;
        enabled && self.active_session().is_none()
    }

    /// Unlocked session, or `None` when locked.
    ///
    /// Counts as activity for the idle auto-lock; an expired session is
    /// locked here before `None` is returned.
    pub fn session(&self) -> Option<Arc<VaultSession>> {
        let session = self.active_session()?;
        self.touch();
        Some(session)
    }

    /// Installed session unless the idle window has passed. Not activity.
    fn active_session(&self) -> Option<Arc<VaultSession>> {
        let session = self.session.read().clone()?;

        if let Some(idle_limit) = self.config.auto_lock_after() {
            let idle = self.last_activity.lock().elapsed();
            if idle >= idle_limit {
                drop(session);
                info!(
                    event = "vault_auto_locked",
                    user_id = %self.user_id,
                    idle_secs = idle.as_secs(),
                    "Vault locked after idle timeout"
                );
                self.lock();
                return None;
            }
        }
        Some(session)
    }

    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Query the remote store at session start or after an auth change.
    pub async fn check_status(&self) -> Result<VaultStatus> {
        let salt = self.store.fetch_salt(&self.user_id).await?;
        let needs_migration = self.store.has_unencrypted_records(&self.user_id).await?;

        match salt {
            Some(salt) => {
                if self.session.read().is_some() && !self.cache.is_same_vault(&salt) {
                    warn!(
                        event = "vault_salt_changed",
                        user_id = %self.user_id,
                        "Remote salt differs from the unlocked session; locking"
                    );
                    self.lock();
                }
                *self.salt.write() = Some(salt);
                self.flags.write().encryption_enabled = true;
            }
            None => {
                self.lock();
                *self.salt.write() = None;
                self.flags.write().encryption_enabled = false;
            }
        }
        self.flags.write().needs_migration = needs_migration;

        let status = self.status();
        debug!(
            event = "vault_status_checked",
            user_id = %self.user_id,
            state = ?status.state,
            needs_migration = status.needs_migration,
            "Vault status refreshed"
        );
        Ok(status)
    }

    /// Re-scan for records without a blob
    pub async fn refresh_migration_status(&self) -> Result<bool> {
        let needs_migration = self.store.has_unencrypted_records(&self.user_id).await?;
        self.flags.write().needs_migration = needs_migration;
        Ok(needs_migration)
    }

    /// Provision a new vault: generate a salt, persist it, derive the key.
    ///
    /// Returns `Ok(false)` if `lock()` was called while the key was being
    /// derived; the salt is persisted but the key is not kept. On a failed
    /// salt write nothing is retained and the vault stays uninitialized.
    pub async fn setup_encryption(&self, password: &str) -> Result<bool> {
        validate_password(password, self.config.min_password_length)?;

        if self.flags.read().encryption_enabled {
            return Err(Error::AlreadyInitialized);
        }
        if self.store.fetch_salt(&self.user_id).await?.is_some() {
            self.flags.write().encryption_enabled = true;
            return Err(Error::AlreadyInitialized);
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let salt = VaultSalt::generate(self.config.salt_len, self.config.key_version);
        let key = derive_key_async(
            Zeroizing::new(password.to_string()),
            salt.salt_bytes()?,
            self.config.kdf,
        )
        .await?;

        if let Err(e) = self.store.store_salt(&self.user_id, &salt).await {
            warn!(
                event = "vault_setup_failed",
                user_id = %self.user_id,
                error = %e,
                "Salt write failed; vault not provisioned"
            );
            return Err(match e {
                Error::RemoteWriteFailure(_) | Error::AlreadyInitialized => e,
                other => Error::RemoteWriteFailure(other.to_string()),
            });
        }

        *self.salt.write() = Some(salt.clone());
        self.flags.write().encryption_enabled = true;

        let installed = self.install(key, salt, epoch);
        if installed {
            info!(event = "vault_setup", user_id = %self.user_id, "Encryption set up");
        }
        Ok(installed)
    }

    /// Derive the key from the stored salt and unlock.
    ///
    /// With `verify_on_unlock`, the derived key must decrypt at least one of
    /// the sampled blobs or the unlock is rejected (`Ok(false)`, still
    /// locked). A user with no well-formed encrypted records yet cannot be
    /// checked and is let in.
    ///
    /// While already unlocked this only checks the password against the
    /// session verifier and leaves the installed key alone.
    pub async fn unlock_with_password(&self, password: &str) -> Result<bool> {
        if self.state() == VaultState::Unlocked {
            return self.confirm_password(password).await;
        }

        let salt = self.current_salt().await?;
        let salt_bytes = salt.salt_bytes()?;
        let epoch = self.epoch.load(Ordering::SeqCst);

        let key = derive_key_async(
            Zeroizing::new(password.to_string()),
            salt_bytes,
            self.config.kdf,
        )
        .await?;

        if self.config.verify_on_unlock && !self.check_key_against_samples(&key).await? {
            warn!(
                event = "vault_unlock_rejected",
                user_id = %self.user_id,
                "Derived key failed to decrypt every sampled record"
            );
            return Ok(false);
        }

        let installed = self.install(key, salt, epoch);
        if installed {
            info!(event = "vault_unlocked", user_id = %self.user_id, "Vault unlocked");
        }
        Ok(installed)
    }

    /// Check a password against the unlocked session without the network.
    pub async fn confirm_password(&self, password: &str) -> Result<bool> {
        let salt = self
            .cache
            .salt()
            .ok_or_else(|| Error::EncryptionUnavailable("Vault is locked".to_string()))?;

        let key = derive_key_async(
            Zeroizing::new(password.to_string()),
            salt.salt_bytes()?,
            self.config.kdf,
        )
        .await?;

        Ok(self.cache.matches(&key.verifier()))
    }

    /// Discard the in-memory key and session cache. Safe to call any time.
    pub fn lock(&self) {
        let mut session = self.session.write();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let was_unlocked = session.take().is_some();
        self.cache.clear();

        if was_unlocked {
            info!(event = "vault_locked", user_id = %self.user_id, "Vault locked");
        }
    }

    /// Lock and forget everything learned about this user's vault
    pub fn logout(&self) {
        self.lock();
        *self.salt.write() = None;
        *self.flags.write() = Flags::default();
        info!(event = "vault_logout", user_id = %self.user_id, "Session ended");
    }

    async fn current_salt(&self) -> Result<VaultSalt> {
        let cached = self.salt.read().clone();
        if let Some(salt) = cached {
            return Ok(salt);
        }

        let salt = self
            .store
            .fetch_salt(&self.user_id)
            .await?
            .ok_or_else(|| Error::SaltNotFound(self.user_id.clone()))?;
        *self.salt.write() = Some(salt.clone());
        self.flags.write().encryption_enabled = true;
        Ok(salt)
    }

    /// Trial-decrypt up to [`UNLOCK_SAMPLE_SIZE`] stored blobs. One success
    /// accepts the key, so a single corrupt row cannot lock the user out.
    async fn check_key_against_samples(&self, key: &VaultKey) -> Result<bool> {
        let samples = self
            .store
            .sample_encrypted_blobs(&self.user_id, UNLOCK_SAMPLE_SIZE)
            .await?;

        let mut checked = 0;
        for data in &samples {
            let blob = match EncryptedBlob::parse(data) {
                Ok(blob) => blob,
                Err(e) => {
                    debug!(event = "vault_sample_malformed", error = %e, "Skipping malformed sample blob");
                    continue;
                }
            };
            if engine::decrypt(key, &blob).is_ok() {
                return Ok(true);
            }
            checked += 1;
        }

        if checked == 0 {
            debug!(
                event = "vault_unlock_unverified",
                user_id = %self.user_id,
                samples = samples.len(),
                "No usable encrypted records to verify the password against"
            );
            return Ok(true);
        }
        Ok(false)
    }

    fn install(&self, key: VaultKey, salt: VaultSalt, epoch: u64) -> bool {
        let mut session = self.session.write();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            info!(
                event = "vault_key_discarded",
                user_id = %self.user_id,
                "Vault locked during key derivation; discarding key"
            );
            return false;
        }

        self.cache.store(key.verifier(), salt.clone());
        *session = Some(Arc::new(VaultSession {
            key,
            key_version: salt.key_version,
        }));
        drop(session);

        self.touch();
        true
    }
}
