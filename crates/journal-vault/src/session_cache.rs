//! Volatile session verification material.
//!
//! Holds a one-way verifier of the session key plus the salt it was derived
//! from, so the UI can tell "provisioned but locked" from "never provisioned"
//! and confirm a password without a network round trip. It never holds the
//! key itself and is never persisted; it lives exactly as long as the
//! controller that owns it.

use crate::kdf::VaultSalt;
use parking_lot::RwLock;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

struct CachedSession {
    verifier: Zeroizing<[u8; 32]>,
    salt: VaultSalt,
}

/// In-memory verifier cache
#[derive(Default)]
pub struct SessionKeyCache {
    slot: RwLock<Option<CachedSession>>,
}

impl SessionKeyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the verifier for the key derived from `salt`
    pub fn store(&self, verifier: Zeroizing<[u8; 32]>, salt: VaultSalt) {
        *self.slot.write() = Some(CachedSession { verifier, salt });
    }

    /// Drop the cached material
    pub fn clear(&self) {
        *self.slot.write() = None;
    }

    /// Check whether session material is loaded
    pub fn is_populated(&self) -> bool {
        self.slot.read().is_some()
    }

    /// The salt the cached verifier belongs to
    pub fn salt(&self) -> Option<VaultSalt> {
        self.slot.read().as_ref().map(|s| s.salt.clone())
    }

    /// True if the cache was filled for this same salt record
    pub fn is_same_vault(&self, salt: &VaultSalt) -> bool {
        self.slot
            .read()
            .as_ref()
            .is_some_and(|s| s.salt == *salt)
    }

    /// Constant-time comparison against the cached verifier
    pub fn matches(&self, verifier: &[u8; 32]) -> bool {
        self.slot
            .read()
            .as_ref()
            .is_some_and(|s| bool::from(s.verifier.as_slice().ct_eq(verifier.as_slice())))
    }
}
