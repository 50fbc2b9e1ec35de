//! # VaultGuard Core
//!
//! Encrypted document vault: AES-256-GCM storage with key rotation,
//! tamper-evident auditing and a session-gated access front.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    VAULTGUARD CORE                       │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │ ACCESS GATE │  │ STORAGE     │  │  AUDIT LOG      │  │
//! │  │ sessions +  │  │ ENGINE      │  │  (hash-chained, │  │
//! │  │ rate limits │  │ AES-256-GCM │  │   encrypted)    │  │
//! │  └──────┬──────┘  └──────┬──────┘  └────────┬────────┘  │
//! │         │                │                   │           │
//! │  ┌──────┴────────────────┴───────────────────┴────────┐ │
//! │  │                     KEY VAULT                       │ │
//! │  │      aliased AES-256 keys, 90-day rotation          │ │
//! │  └─────────────────────────────────────────────────────┘ │
//! │                                                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │  VERSIONED  │  │  ZIP BACKUP │  │  RETENTION      │  │
//! │  │  ENVELOPE   │  │  (verbatim) │  │  SWEEP          │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - Every stored byte encrypted with AES-256-GCM, fresh nonce per write
//! - Each envelope names the key that encrypted it, so rotation converges
//! - Keys live behind the [`keyvault::KeyVault`] trait and never in blobs
//! - Audit entries are hash-chained; edits and reordering are detectable
//! - Repeated authentication failures escalate to a full vault wipe

pub mod audit;
pub mod backup;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod keyvault;
pub mod metadata;
pub mod retention;
pub mod session;
pub mod state;
pub mod storage;
pub mod textlog;

pub use audit::{AuditLogEntry, AuditLogger};
pub use error::{VaultError, VaultResult};
pub use keyvault::{FallbackKeyVault, KeyVault, SoftwareKeyVault};
pub use metadata::DocumentMetadata;
pub use session::{AccessGate, AuthOutcome, AuthPrompt, GateConfig};
pub use state::{FilePrefsStore, MemoryPrefsStore, PrefsStore};
pub use storage::{SaveOutcome, SecureStorage};

/// VaultGuard Core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
