//! Password-based key derivation
//!
//! Argon2id over (password, per-user salt) yields the 256-bit key used by the
//! encryption engine. Derivation is deliberately slow; callers on an
//! interactive path use [`derive_key_async`], which moves the work onto the
//! blocking pool.

use crate::config::PASSWORD_LENGTH_FLOOR;
use crate::{Error, Result};
use argon2::{Algorithm, Argon2, ParamsBuilder, Version};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

/// Minimum salt length accepted by derivation (128 bits)
pub const MIN_SALT_LEN: usize = 16;

const VERIFIER_DOMAIN: &[u8] = b"journal-vault/session-verifier/v1";

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub m_cost_kib: u32,
    /// Iterations
    pub t_cost: u32,
    /// Parallel lanes
    pub p_cost: u32,
}

impl Default for KdfParams {
    /// Memory: 64 MiB, Iterations: 3, Parallelism: 4
    fn default() -> Self {
        Self {
            m_cost_kib: 65536,
            t_cost: 3,
            p_cost: 4,
        }
    }
}

impl KdfParams {
    /// Cheap parameters; never use outside tests.
    pub fn for_test() -> Self {
        Self {
            m_cost_kib: 1024,
            t_cost: 1,
            p_cost: 1,
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = ParamsBuilder::new()
            .m_cost(self.m_cost_kib)
            .t_cost(self.t_cost)
            .p_cost(self.p_cost)
            .output_len(32)
            .build()
            .map_err(|e| Error::DerivationFailure(e.to_string()))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Check the parameters are accepted by Argon2
    pub fn validate(&self) -> Result<()> {
        self.argon2().map(|_| ())
    }
}

/// Per-user salt record held by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSalt {
    /// Base64-encoded random salt
    pub password_salt: String,
    /// Version of the key derived from this salt
    pub key_version: u32,
}

impl VaultSalt {
    /// Fresh random salt of `len` bytes
    pub fn generate(len: usize, key_version: u32) -> Self {
        Self {
            password_salt: B64.encode(generate_salt(len)),
            key_version,
        }
    }

    /// Decode the salt bytes, rejecting malformed or short salts
    pub fn salt_bytes(&self) -> Result<Vec<u8>> {
        let salt = B64
            .decode(self.password_salt.trim())
            .map_err(|_| Error::DerivationFailure("Salt is not valid base64".to_string()))?;
        if salt.len() < MIN_SALT_LEN {
            return Err(Error::DerivationFailure(format!(
                "Salt too short: {} bytes (minimum {})",
                salt.len(),
                MIN_SALT_LEN
            )));
        }
        Ok(salt)
    }
}

/// Generate secure random salt
pub fn generate_salt(len: usize) -> Vec<u8> {
    let mut salt = vec![0u8; len];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Symmetric key usable only by the encryption engine
pub struct VaultKey {
    key: Zeroizing<[u8; 32]>,
}

impl VaultKey {
    pub(crate) fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            key: Zeroizing::new(bytes),
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// One-way verifier for the session cache; does not reveal the key.
    pub fn verifier(&self) -> Zeroizing<[u8; 32]> {
        let mut hasher = Sha256::new();
        hasher.update(VERIFIER_DOMAIN);
        hasher.update(self.key.as_slice());
        Zeroizing::new(hasher.finalize().into())
    }

    /// Random key, for tests
    #[cfg(test)]
    pub(crate) fn random() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self::from_bytes(key)
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey(<redacted>)")
    }
}

/// Derive the vault key from password and salt bytes (blocking).
pub fn derive_key(password: &str, salt: &[u8], params: &KdfParams) -> Result<VaultKey> {
    if password.is_empty() {
        return Err(Error::DerivationFailure("Password is empty".to_string()));
    }
    if salt.len() < MIN_SALT_LEN {
        return Err(Error::DerivationFailure("Salt too short".to_string()));
    }

    let mut key = Zeroizing::new([0u8; 32]);
    params
        .argon2()?
        .hash_password_into(password.as_bytes(), salt, &mut *key)
        .map_err(|e| Error::DerivationFailure(e.to_string()))?;

    Ok(VaultKey { key })
}

/// Derive on the blocking pool so the async caller stays responsive.
pub async fn derive_key_async(
    password: Zeroizing<String>,
    salt: Vec<u8>,
    params: KdfParams,
) -> Result<VaultKey> {
    tokio::task::spawn_blocking(move || derive_key(&password, &salt, &params))
        .await
        .map_err(|e| Error::DerivationFailure(format!("Derivation task failed: {}", e)))?
}

/// Password strength buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordStrength {
    /// < 8 characters
    Weak,
    /// 8-11 characters
    Fair,
    /// 12-15 characters, or longer with little variety
    Good,
    /// 16+ characters with variety
    Strong,
}

impl PasswordStrength {
    /// Check if password meets minimum requirements
    pub fn is_acceptable(&self) -> bool {
        matches!(self, Self::Good | Self::Strong)
    }
}

/// Evaluate password strength
pub fn evaluate_strength(password: &str) -> PasswordStrength {
    let len = password.chars().count();
    let variety = [
        password.chars().any(|c| c.is_lowercase()),
        password.chars().any(|c| c.is_uppercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_alphanumeric()),
    ]
    .iter()
    .filter(|&&b| b)
    .count();

    if len < 8 {
        PasswordStrength::Weak
    } else if len < 12 {
        PasswordStrength::Fair
    } else if len < 16 || variety < 3 {
        PasswordStrength::Good
    } else {
        PasswordStrength::Strong
    }
}

/// Enforce the minimum-length policy for new vault passwords.
///
/// `min_len` is raised to [`PASSWORD_LENGTH_FLOOR`], so a weak password is
/// never accepted. Strength above that is advisory.
pub fn validate_password(password: &str, min_len: usize) -> Result<()> {
    let required = min_len.max(PASSWORD_LENGTH_FLOOR);
    if password.chars().count() < required {
        return Err(Error::Validation(format!(
            "Password must be at least {} characters",
            required
        )));
    }
    let strength = evaluate_strength(password);
    if !strength.is_acceptable() {
        tracing::debug!(?strength, "Password accepted below recommended strength");
    }
    Ok(())
}
