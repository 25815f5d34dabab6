//! Error types
//!
//! Mirrors the vault's failure taxonomy: missing salt, derivation problems,
//! a locked or disabled vault, authentication failures on decrypt, and
//! remote-store failures.

use std::fmt;

/// Vault errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No salt row exists for the user (setup never ran)
    #[error("Salt not found: {0}")]
    SaltNotFound(String),

    /// Malformed salt or password input at key derivation
    #[error("Key derivation failed: {0}")]
    DerivationFailure(String),

    /// Vault is locked or encryption is disabled
    #[error("Encryption unavailable: {0}")]
    EncryptionUnavailable(String),

    /// Cipher failure while sealing a bundle
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Integrity tag mismatch or malformed blob
    #[error("Decryption failed: {0}")]
    DecryptionFailure(String),

    /// Salt or record persistence failed
    #[error("Remote write failed: {0}")]
    RemoteWriteFailure(String),

    /// Salt or record fetch failed
    #[error("Remote read failed: {0}")]
    RemoteReadFailure(String),

    /// Setup requested for a vault that already has a salt
    #[error("Vault already initialized")]
    AlreadyInitialized,

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the caller can recover by prompting the user (unlock, retry)
    /// rather than treating the failure as data corruption.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::EncryptionUnavailable(_)
                | Error::DecryptionFailure(_)
                | Error::RemoteWriteFailure(_)
                | Error::RemoteReadFailure(_)
                | Error::Validation(_)
        )
    }

    /// True when the right response is to ask the user for their password.
    pub fn needs_unlock(&self) -> bool {
        matches!(self, Error::EncryptionUnavailable(_))
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::SaltNotFound(_) | Error::AlreadyInitialized => ErrorCategory::Provisioning,
            Error::DerivationFailure(_) => ErrorCategory::Keys,
            Error::EncryptionUnavailable(_) => ErrorCategory::Locked,
            Error::DecryptionFailure(_) => ErrorCategory::Integrity,
            Error::RemoteWriteFailure(_) | Error::RemoteReadFailure(_) => ErrorCategory::Remote,
            Error::Validation(_) => ErrorCategory::Input,
            Error::Encryption(_) | Error::Serialization(_) => ErrorCategory::Internal,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Vault provisioning state
    Provisioning,
    /// Key derivation
    Keys,
    /// Vault locked or disabled
    Locked,
    /// Authentication / blob integrity
    Integrity,
    /// Remote store
    Remote,
    /// User input
    Input,
    /// Internal/system errors
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Provisioning => write!(f, "Provisioning"),
            ErrorCategory::Keys => write!(f, "Keys"),
            ErrorCategory::Locked => write!(f, "Locked"),
            ErrorCategory::Integrity => write!(f, "Integrity"),
            ErrorCategory::Remote => write!(f, "Remote"),
            ErrorCategory::Input => write!(f, "Input"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
