//! Vault configuration

use crate::kdf::KdfParams;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Minimum password length enforced at setup
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Lowest `min_password_length` a config may set; shorter passwords rate weak
pub const PASSWORD_LENGTH_FLOOR: usize = 8;

/// Key version written with new salts
pub const CURRENT_KEY_VERSION: u32 = 1;

/// Default random salt length (bytes)
pub const DEFAULT_SALT_LEN: usize = 32;

/// Vault configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Argon2id parameters
    pub kdf: KdfParams,
    /// Minimum password length accepted by `setup_encryption`
    pub min_password_length: usize,
    /// Key version stamped on new salts and blobs
    pub key_version: u32,
    /// Salt length in bytes
    pub salt_len: usize,
    /// Lock the vault after this many idle seconds
    pub auto_lock_secs: Option<u64>,
    /// Trial-decrypt an existing blob before accepting an unlock
    pub verify_on_unlock: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            min_password_length: MIN_PASSWORD_LENGTH,
            key_version: CURRENT_KEY_VERSION,
            salt_len: DEFAULT_SALT_LEN,
            auto_lock_secs: None,
            verify_on_unlock: true,
        }
    }
}

impl VaultConfig {
    /// Config with cheap KDF parameters for tests
    pub fn for_test() -> Self {
        Self {
            kdf: KdfParams::for_test(),
            ..Self::default()
        }
    }

    /// Parse from a JSON document; absent fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Validation(format!("Cannot read config {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Reject configurations that would weaken the vault
    pub fn validate(&self) -> Result<()> {
        if self.salt_len < 16 {
            return Err(Error::Validation("salt_len must be at least 16 bytes".to_string()));
        }
        if self.key_version == 0 {
            return Err(Error::Validation("key_version must be positive".to_string()));
        }
        if self.min_password_length < PASSWORD_LENGTH_FLOOR {
            return Err(Error::Validation(format!(
                "min_password_length must be at least {}",
                PASSWORD_LENGTH_FLOOR
            )));
        }
        self.kdf.validate()
    }

    /// Idle window after which the vault locks itself
    pub fn auto_lock_after(&self) -> Option<Duration> {
        self.auto_lock_secs.map(Duration::from_secs)
    }
}
