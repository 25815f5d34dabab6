//! Authenticated encryption of the sensitive field bundle
//!
//! AES-256-GCM with a fresh random 96-bit nonce per call. The blob version is
//! bound as associated data so it cannot be altered without failing the tag
//! check. The bundle is one atomic unit; there is no per-field decryption.

use crate::blob::EncryptedBlob;
use crate::bundle::SensitiveFieldBundle;
use crate::kdf::VaultKey;
use crate::{Error, Result};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

/// AES-GCM nonce length in bytes
pub const NONCE_LEN: usize = 12;

fn associated_data(version: u32) -> Vec<u8> {
    format!("journal-vault/bundle/v{}", version).into_bytes()
}

/// Encrypt a bundle under `key`, stamping the blob with `version`.
pub fn encrypt(key: &VaultKey, bundle: &SensitiveFieldBundle, version: u32) -> Result<EncryptedBlob> {
    let plaintext = Zeroizing::new(bundle.to_bytes()?);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let aad = associated_data(version);
    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: &plaintext,
                aad: &aad,
            },
        )
        .map_err(|_| Error::Encryption("AEAD encryption failed".to_string()))?;

    Ok(EncryptedBlob::from_parts(&nonce_bytes, &ciphertext, version))
}

/// Verify and decrypt a blob. Nothing is returned unless the tag checks out.
pub fn decrypt(key: &VaultKey, blob: &EncryptedBlob) -> Result<SensitiveFieldBundle> {
    let nonce_bytes = blob.nonce_bytes()?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(Error::DecryptionFailure(format!(
            "Invalid nonce length: {}",
            nonce_bytes.len()
        )));
    }
    let ciphertext = blob.ciphertext_bytes()?;

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let aad = associated_data(blob.version());
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| Error::DecryptionFailure("Authentication tag mismatch".to_string()))?,
    );

    SensitiveFieldBundle::from_bytes(&plaintext)
        .map_err(|e| Error::DecryptionFailure(format!("Decrypted bundle is malformed: {}", e)))
}
