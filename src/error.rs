//! VaultGuard Core - Error Types

use thiserror::Error;

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    // ═══════════════════════════════════════════════════════════════
    // CRYPTO / FORMAT ERRORS
    // ═══════════════════════════════════════════════════════════════

    /// GCM tag did not verify: the record was tampered with or the wrong
    /// key was used. Never retried with a different key.
    #[error("authentication failed - record tampered or wrong key")]
    AuthenticationFailed,

    #[error("corrupt envelope: {0}")]
    CorruptFormat(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    // ═══════════════════════════════════════════════════════════════
    // KEY VAULT ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("key vault failure: {0}")]
    KeyVault(String),

    // ═══════════════════════════════════════════════════════════════
    // ACCESS GATE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("rate limited - try again in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("locked out - try again in {retry_after_secs}s")]
    LockedOut { retry_after_secs: u64 },

    #[error("vault wiped after repeated authentication failures")]
    SelfDestructTriggered,

    #[error("authentication prompt unavailable: {0}")]
    PromptUnavailable(String),

    // ═══════════════════════════════════════════════════════════════
    // I/O AND SERIALIZATION
    // ═══════════════════════════════════════════════════════════════

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl VaultError {
    /// Check if this is a security-critical error
    pub fn is_security_critical(&self) -> bool {
        matches!(
            self,
            VaultError::AuthenticationFailed
                | VaultError::CorruptFormat(_)
                | VaultError::SelfDestructTriggered
        )
    }

    /// Check if the caller may simply retry later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VaultError::RateLimited { .. } | VaultError::LockedOut { .. } | VaultError::Io(_)
        )
    }

    /// Seconds the caller should wait before retrying, if known
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            VaultError::RateLimited { retry_after_secs }
            | VaultError::LockedOut { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}

impl From<zip::result::ZipError> for VaultError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => VaultError::Io(io),
            other => VaultError::CorruptFormat(other.to_string()),
        }
    }
}
