//! VaultGuard Core - Versioned File Codec
//!
//! On-disk envelope for encrypted records.
//!
//! V2 layout (the only format we write):
//! `MAGIC(4) | alias_len(4) | alias utf8 | nonce_len(4) | nonce | ct_len(4) | ct`
//!
//! Legacy V1 layout (decode only, no magic, no alias):
//! `nonce_len(4) | nonce | ct_len(4) | ct`
//!
//! All length fields are big-endian u32. V1 records carry no alias; the
//! caller's legacy alias (`"{base}_v1"`) is inferred on decode. This dual
//! decode path is the backward-compatibility seam that lets pre-rotation
//! files survive format upgrades.

use crate::error::{VaultError, VaultResult};

/// 'VGS2' (VaultGuard Storage v2)
pub const MAGIC: u32 = 0x5647_5332;

const MAX_ALIAS_LEN: usize = 256;
const MAX_NONCE_LEN: usize = 64;
const MAX_CIPHERTEXT_LEN: usize = 100_000_000;

/// Envelope format version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    V1,
    V2,
}

/// One persisted encrypted record
#[derive(Debug, Clone)]
pub struct EncryptedRecord {
    /// Alias of the key this record was encrypted under
    pub key_alias: String,
    /// AES-GCM nonce
    pub nonce: Vec<u8>,
    /// Ciphertext with authentication tag appended
    pub ciphertext: Vec<u8>,
    /// Envelope version this record was decoded from (or will be encoded as)
    pub format_version: FormatVersion,
}

impl EncryptedRecord {
    /// Create a V2 record ready for encoding
    pub fn v2(key_alias: impl Into<String>, nonce: Vec<u8>, ciphertext: Vec<u8>) -> Self {
        Self {
            key_alias: key_alias.into(),
            nonce,
            ciphertext,
            format_version: FormatVersion::V2,
        }
    }

    /// Encode as the V2 envelope. V1 is decode-only; records read as V1 are
    /// always rewritten as V2.
    pub fn encode(&self) -> VaultResult<Vec<u8>> {
        let alias = self.key_alias.as_bytes();
        if alias.is_empty() || alias.len() > MAX_ALIAS_LEN {
            return Err(VaultError::CorruptFormat(format!(
                "invalid alias length {}",
                alias.len()
            )));
        }
        if self.nonce.is_empty() || self.nonce.len() > MAX_NONCE_LEN {
            return Err(VaultError::CorruptFormat(format!(
                "invalid nonce length {}",
                self.nonce.len()
            )));
        }
        if self.ciphertext.is_empty() || self.ciphertext.len() > MAX_CIPHERTEXT_LEN {
            return Err(VaultError::CorruptFormat(format!(
                "invalid ciphertext length {}",
                self.ciphertext.len()
            )));
        }

        let mut out =
            Vec::with_capacity(16 + alias.len() + self.nonce.len() + self.ciphertext.len());
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&(alias.len() as u32).to_be_bytes());
        out.extend_from_slice(alias);
        out.extend_from_slice(&(self.nonce.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&(self.ciphertext.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.ciphertext);
        Ok(out)
    }

    /// Decode either envelope version. `legacy_alias` is the alias assumed
    /// for V1 records, which carry none of their own.
    pub fn decode(bytes: &[u8], legacy_alias: &str) -> VaultResult<Self> {
        let mut r = Reader::new(bytes);
        let first = r.read_u32()?;

        if first == MAGIC {
            let alias_len = r.read_u32()? as usize;
            if alias_len == 0 || alias_len > MAX_ALIAS_LEN {
                return Err(VaultError::CorruptFormat(format!(
                    "invalid alias_len={alias_len}"
                )));
            }
            let alias_bytes = r.read_bytes(alias_len)?;
            let key_alias = std::str::from_utf8(alias_bytes)
                .map_err(|_| VaultError::CorruptFormat("alias is not valid utf-8".into()))?
                .to_string();

            let nonce_len = r.read_u32()? as usize;
            if nonce_len == 0 || nonce_len > MAX_NONCE_LEN {
                return Err(VaultError::CorruptFormat(format!(
                    "invalid nonce_len={nonce_len}"
                )));
            }
            let nonce = r.read_bytes(nonce_len)?.to_vec();

            let ct_len = r.read_u32()? as usize;
            if ct_len == 0 || ct_len > MAX_CIPHERTEXT_LEN {
                return Err(VaultError::CorruptFormat(format!("invalid ct_len={ct_len}")));
            }
            let ciphertext = r.read_bytes(ct_len)?.to_vec();

            Ok(Self {
                key_alias,
                nonce,
                ciphertext,
                format_version: FormatVersion::V2,
            })
        } else {
            // Legacy V1: the first u32 is the nonce length.
            let nonce_len = first as usize;
            if nonce_len == 0 || nonce_len > MAX_NONCE_LEN {
                return Err(VaultError::CorruptFormat(format!(
                    "invalid v1 nonce_len={nonce_len}"
                )));
            }
            let nonce = r.read_bytes(nonce_len)?.to_vec();

            let ct_len = r.read_u32()? as usize;
            if ct_len == 0 || ct_len > MAX_CIPHERTEXT_LEN {
                return Err(VaultError::CorruptFormat(format!(
                    "invalid v1 ct_len={ct_len}"
                )));
            }
            let ciphertext = r.read_bytes(ct_len)?.to_vec();

            Ok(Self {
                key_alias: legacy_alias.to_string(),
                nonce,
                ciphertext,
                format_version: FormatVersion::V1,
            })
        }
    }
}

/// Encode a V1 envelope. Only used by tests and migration tooling; the
/// engine never writes this format.
pub fn encode_legacy_v1(nonce: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + nonce.len() + ciphertext.len());
    out.extend_from_slice(&(nonce.len() as u32).to_be_bytes());
    out.extend_from_slice(nonce);
    out.extend_from_slice(&(ciphertext.len() as u32).to_be_bytes());
    out.extend_from_slice(ciphertext);
    out
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_u32(&mut self) -> VaultResult<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_bytes(&mut self, n: usize) -> VaultResult<&'a [u8]> {
        if self.buf.len() - self.pos < n {
            return Err(VaultError::CorruptFormat("truncated envelope".into()));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY: &str = "vaultguard_secure_storage_key_v1";

    #[test]
    fn test_v2_roundtrip() {
        let rec = EncryptedRecord::v2("vaultguard_secure_storage_key_123", vec![7u8; 12], vec![9u8; 48]);
        let bytes = rec.encode().unwrap();
        assert_eq!(&bytes[..4], &MAGIC.to_be_bytes());

        let back = EncryptedRecord::decode(&bytes, LEGACY).unwrap();
        assert_eq!(back.key_alias, rec.key_alias);
        assert_eq!(back.nonce, rec.nonce);
        assert_eq!(back.ciphertext, rec.ciphertext);
        assert_eq!(back.format_version, FormatVersion::V2);
    }

    #[test]
    fn test_legacy_v1_decode() {
        let bytes = encode_legacy_v1(&[1u8; 12], &[2u8; 32]);
        let rec = EncryptedRecord::decode(&bytes, LEGACY).unwrap();

        assert_eq!(rec.format_version, FormatVersion::V1);
        assert_eq!(rec.key_alias, LEGACY);
        assert_eq!(rec.nonce, vec![1u8; 12]);
        assert_eq!(rec.ciphertext, vec![2u8; 32]);
    }

    #[test]
    fn test_truncated_rejected() {
        let rec = EncryptedRecord::v2("alias", vec![7u8; 12], vec![9u8; 48]);
        let bytes = rec.encode().unwrap();

        for cut in [2, 6, 10, bytes.len() - 1] {
            let result = EncryptedRecord::decode(&bytes[..cut], LEGACY);
            assert!(matches!(result, Err(VaultError::CorruptFormat(_))), "cut={cut}");
        }
    }

    #[test]
    fn test_v1_bad_nonce_len_rejected() {
        // First u32 is neither MAGIC nor a plausible v1 nonce length.
        let mut bytes = 65u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 80]);
        assert!(matches!(
            EncryptedRecord::decode(&bytes, LEGACY),
            Err(VaultError::CorruptFormat(_))
        ));
    }

    #[test]
    fn test_bounds_enforced_on_encode() {
        let rec = EncryptedRecord::v2("a".repeat(257), vec![7u8; 12], vec![9u8; 16]);
        assert!(rec.encode().is_err());

        let rec = EncryptedRecord::v2("alias", vec![], vec![9u8; 16]);
        assert!(rec.encode().is_err());

        let rec = EncryptedRecord::v2("alias", vec![7u8; 12], vec![]);
        assert!(rec.encode().is_err());
    }
}
