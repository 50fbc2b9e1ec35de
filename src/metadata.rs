//! VaultGuard Core - Document Metadata
//!
//! Minimal, versioned metadata record stored encrypted next to each blob.
//! The JSON field names are part of the stored format and must not change.

use serde::{Deserialize, Serialize};

use crate::error::VaultResult;

/// Metadata for a stored document/ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(rename = "schemaVersion", default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(rename = "type")]
    pub doc_type: String,

    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none", default)]
    pub display_name: Option<String>,

    #[serde(
        rename = "issuingAuthority",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub issuing_authority: Option<String>,

    #[serde(
        rename = "issuedAtEpochMillis",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub issued_at_ms: Option<i64>,

    #[serde(
        rename = "expirationEpochMillis",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub expiration_ms: Option<i64>,

    /// Free-text notes; upstream collaborators may stuff nested JSON here.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notes: Option<String>,
}

fn default_schema_version() -> u32 {
    1
}

impl DocumentMetadata {
    /// Minimal record with just a type
    pub fn new(doc_type: impl Into<String>) -> Self {
        Self {
            schema_version: 1,
            doc_type: doc_type.into(),
            display_name: None,
            issuing_authority: None,
            issued_at_ms: None,
            expiration_ms: None,
            notes: None,
        }
    }

    pub fn to_json_bytes(&self) -> VaultResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Tolerant decode: unknown fields are ignored so newer schema versions
    /// stay readable. Returns `None` for payloads that are not valid records.
    pub fn from_json_bytes(raw: &[u8]) -> Option<Self> {
        serde_json::from_slice(raw).ok()
    }
}
