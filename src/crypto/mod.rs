//! VaultGuard Core - Cryptographic Core
//!
//! AES-256-GCM authenticated encryption over vault-held keys.

pub mod aead;
pub mod keys;

pub use aead::{decrypt_aes_gcm, encrypt_aes_gcm, EncryptedData};
pub use keys::{generate_nonce, VaultKey, KEY_LEN, NONCE_LEN, TAG_LEN};
