//! VaultGuard Core - Tamper-Evident Audit Log
//!
//! Hash-chained, append-only event log persisted through [`SecureStorage`]
//! as one encrypted blob holding a JSON array. Hash chaining gives ordered
//! append-only semantics and detects edits or reordering without needing a
//! blockchain. The whole array is rewritten on every append, which is fine
//! at expected volumes; segment rolling is the known scaling escape hatch.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{VaultError, VaultResult};
use crate::storage::SecureStorage;

/// Logical blob name the serialized log is stored under
pub const AUDIT_LOG_NAME: &str = "vaultguard_audit_log";

/// `prev_hash` of the first entry in the chain
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One chained audit event. JSON field names are part of the stored format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    #[serde(rename = "ts")]
    pub ts_ms: i64,
    #[serde(rename = "eventType")]
    pub event_type: String,
    pub data: BTreeMap<String, String>,
    #[serde(rename = "prevHash")]
    pub prev_hash: String,
    pub hash: String,
}

impl AuditLogEntry {
    /// `SHA256("{ts}|{event}|{prev}|k=v;k=v;...")` with keys in sorted
    /// order, hex-encoded. The canonicalization makes hashes deterministic
    /// regardless of how the data map was built.
    pub fn compute_hash_hex(
        ts_ms: i64,
        event_type: &str,
        data: &BTreeMap<String, String>,
        prev_hash: &str,
    ) -> String {
        let mut canonical = format!("{ts_ms}|{event_type}|{prev_hash}|");
        for (k, v) in data {
            canonical.push_str(k);
            canonical.push('=');
            canonical.push_str(v);
            canonical.push(';');
        }
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}

/// Encrypted audit logger backed by SecureStorage
pub struct AuditLogger {
    storage: Arc<SecureStorage>,
    /// Serializes append's load-rewrite cycle; concurrent appends would
    /// otherwise lose entries.
    write_lock: Mutex<()>,
}

impl AuditLogger {
    pub fn new(storage: Arc<SecureStorage>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Append an event, chaining it to the current tail.
    pub fn append(
        &self,
        event_type: &str,
        data: BTreeMap<String, String>,
    ) -> VaultResult<AuditLogEntry> {
        self.append_at(crate::storage::now_ms(), event_type, data)
    }

    pub fn append_at(
        &self,
        ts_ms: i64,
        event_type: &str,
        data: BTreeMap<String, String>,
    ) -> VaultResult<AuditLogEntry> {
        let _guard = self.write_lock.lock();

        let mut entries = self.load_entries();
        let prev_hash = entries
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let hash = AuditLogEntry::compute_hash_hex(ts_ms, event_type, &data, &prev_hash);
        let entry = AuditLogEntry {
            ts_ms,
            event_type: event_type.to_string(),
            data,
            prev_hash,
            hash,
        };
        entries.push(entry.clone());

        let serialized = serde_json::to_vec(&entries)?;
        if !self.storage.save(AUDIT_LOG_NAME, &serialized) {
            return Err(VaultError::Io(std::io::Error::other(
                "audit log write failed",
            )));
        }
        Ok(entry)
    }

    /// Walk the whole chain from genesis, recomputing every hash. O(n).
    pub fn verify(&self) -> bool {
        let entries = self.load_entries();
        let mut prev = GENESIS_HASH.to_string();
        for entry in &entries {
            if entry.prev_hash != prev {
                return false;
            }
            let expected = AuditLogEntry::compute_hash_hex(
                entry.ts_ms,
                &entry.event_type,
                &entry.data,
                &entry.prev_hash,
            );
            if expected != entry.hash {
                return false;
            }
            prev = entry.hash.clone();
        }
        true
    }

    /// All entries in append order
    pub fn read_all(&self) -> Vec<AuditLogEntry> {
        self.load_entries()
    }

    /// Fail-soft load: a missing, undecryptable or unparseable log reads as
    /// empty so auditing never blocks the operation being audited.
    fn load_entries(&self) -> Vec<AuditLogEntry> {
        let raw = match self.storage.load(AUDIT_LOG_NAME) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                log::warn!("audit log unreadable: {e}");
                return Vec::new();
            }
        };
        serde_json::from_slice(&raw).unwrap_or_default()
    }
}
