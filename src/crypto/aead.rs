//! VaultGuard Core - AEAD Encryption
//!
//! AES-256-GCM with a fresh random 96-bit nonce per call and the 128-bit
//! tag appended to the ciphertext (standard GCM output).

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};

use super::keys::{generate_nonce, VaultKey, NONCE_LEN};
use crate::error::{VaultError, VaultResult};

/// Encrypted payload: nonce plus ciphertext with authentication tag
pub struct EncryptedData {
    /// Fresh 12-byte nonce
    pub nonce: Vec<u8>,
    /// Ciphertext with authentication tag appended
    pub ciphertext: Vec<u8>,
}

/// Encrypt data with AES-256-GCM
pub fn encrypt_aes_gcm(key: &VaultKey, plaintext: &[u8]) -> VaultResult<EncryptedData> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedData {
        nonce: nonce_bytes.to_vec(),
        ciphertext,
    })
}

/// Decrypt data with AES-256-GCM.
///
/// A tag mismatch surfaces as [`VaultError::AuthenticationFailed`] so callers
/// can distinguish "tampered/wrong key" from "not found" or plain I/O errors.
pub fn decrypt_aes_gcm(key: &VaultKey, nonce: &[u8], ciphertext: &[u8]) -> VaultResult<Vec<u8>> {
    if nonce.len() != NONCE_LEN {
        return Err(VaultError::CorruptFormat(format!(
            "invalid nonce length {}",
            nonce.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| VaultError::AuthenticationFailed)
}
