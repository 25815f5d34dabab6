//! Encrypted blob wire format
//!
//! Stored as a JSON string in the record's `encrypted_data` column:
//! `{"iv": <base64 nonce>, "ciphertext": <base64 ciphertext+tag>, "version": <int>}`.
//! `version` is optional on input; blobs written before versioning are read
//! as version 1.

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Version assumed for blobs without a `version` field
pub const LEGACY_BLOB_VERSION: u32 = 1;

/// Output of one AEAD call over a serialized bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    /// Base64 nonce
    pub iv: String,
    /// Base64 ciphertext with the authentication tag appended
    pub ciphertext: String,
    /// Key version the blob was written under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl EncryptedBlob {
    pub(crate) fn from_parts(nonce: &[u8], ciphertext: &[u8], version: u32) -> Self {
        Self {
            iv: B64.encode(nonce),
            ciphertext: B64.encode(ciphertext),
            version: Some(version),
        }
    }

    /// Effective version
    pub fn version(&self) -> u32 {
        self.version.unwrap_or(LEGACY_BLOB_VERSION)
    }

    pub(crate) fn nonce_bytes(&self) -> Result<Vec<u8>> {
        B64.decode(&self.iv)
            .map_err(|_| Error::DecryptionFailure("Blob iv is not valid base64".to_string()))
    }

    pub(crate) fn ciphertext_bytes(&self) -> Result<Vec<u8>> {
        B64.decode(&self.ciphertext)
            .map_err(|_| Error::DecryptionFailure("Blob ciphertext is not valid base64".to_string()))
    }

    /// Serialize for the `encrypted_data` column
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the `encrypted_data` column. A malformed blob is a decryption
    /// failure, not a serialization error: the record stays in placeholder
    /// state either way.
    pub fn parse(data: &str) -> Result<Self> {
        serde_json::from_str(data)
            .map_err(|e| Error::DecryptionFailure(format!("Malformed blob: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_roundtrip() {
        let blob = EncryptedBlob::from_parts(&[7u8; 12], &[1, 2, 3, 4], 1);
        let json = blob.to_json_string().unwrap();
        assert!(json.contains("\"iv\""));
        assert!(json.contains("\"version\":1"));

        let parsed = EncryptedBlob::parse(&json).unwrap();
        assert_eq!(parsed, blob);
        assert_eq!(parsed.to_json_string().unwrap(), json);
    }

    #[test]
    fn test_missing_version_is_legacy() {
        let parsed = EncryptedBlob::parse(r#"{"iv":"AAAAAAAAAAAAAAAA","ciphertext":"AQID"}"#).unwrap();
        assert_eq!(parsed.version, None);
        assert_eq!(parsed.version(), LEGACY_BLOB_VERSION);

        // Absent version stays absent on re-serialization
        assert!(!parsed.to_json_string().unwrap().contains("version"));
    }

    #[test]
    fn test_malformed_blob() {
        assert!(matches!(
            EncryptedBlob::parse("not json"),
            Err(Error::DecryptionFailure(_))
        ));
        assert!(matches!(
            EncryptedBlob::parse(r#"{"iv": 5}"#),
            Err(Error::DecryptionFailure(_))
        ));
    }
}
