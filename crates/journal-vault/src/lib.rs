//! Client-side field encryption for the wellness journal
//!
//! Sensitive journal fields (strains, dosage, notes, symptom scores) are
//! encrypted on the client before they reach the backend, which only ever
//! sees placeholders, an opaque blob, and the per-user salt.
//!
//! ## Components
//!
//! - **Key derivation**: Argon2id (64 MiB, 3 iterations, 4 lanes) over
//!   password + per-user salt, run off the async executor
//! - **Encryption engine**: AES-256-GCM over the whole sensitive field bundle,
//!   fresh nonce per write, blob version bound as associated data
//! - **Session cache**: volatile verifier + salt, never the key
//! - **Vault controller**: setup / unlock / lock lifecycle, owns the key
//! - **Adapter**: record ⇄ blob mapping, placeholder sanitization,
//!   fail-closed reads, lazy migration of legacy rows

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod blob;
pub mod bundle;
pub mod config;
pub mod engine;
pub mod error;
pub mod kdf;
pub mod migration;
pub mod record;
pub mod session_cache;
pub mod store;
pub mod vault;

pub use adapter::{EncryptedEntry, JournalEncryptionAdapter};
pub use blob::EncryptedBlob;
pub use bundle::{SensitiveFieldBundle, ENCRYPTED_PLACEHOLDER};
pub use config::{VaultConfig, CURRENT_KEY_VERSION, MIN_PASSWORD_LENGTH, PASSWORD_LENGTH_FLOOR};
pub use error::{Error, ErrorCategory, Result};
pub use kdf::{
    derive_key, derive_key_async, evaluate_strength, KdfParams, PasswordStrength, VaultKey,
    VaultSalt,
};
pub use migration::{MigrationReport, MigrationStatus};
pub use record::{JournalRecord, RecordState};
pub use session_cache::SessionKeyCache;
pub use store::{MemoryRemoteStore, RemoteStore};
pub use vault::{VaultController, VaultSession, VaultState, VaultStatus, UNLOCK_SAMPLE_SIZE};
