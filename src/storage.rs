//! VaultGuard Core - Secure Storage Engine
//!
//! Orchestrates the key vault, the AEAD cipher and the versioned codec over
//! a single directory of encrypted blob/metadata pairs. Each logical name
//! `n` maps to `n.vgenc` (document bytes) and optionally `n.vgmeta`
//! (encrypted JSON metadata), both in the envelope format of [`crate::codec`].
//!
//! Mutating operations on the same name must be serialized by the caller;
//! the rotation sweep holds a coarse lock for its whole directory walk.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backup;
use crate::codec::EncryptedRecord;
use crate::crypto::{decrypt_aes_gcm, encrypt_aes_gcm};
use crate::error::{VaultError, VaultResult};
use crate::keyvault::KeyVault;
use crate::metadata::DocumentMetadata;
use crate::state::PrefsStore;

/// Encrypted document blob suffix
pub const BLOB_SUFFIX: &str = ".vgenc";
/// Encrypted metadata suffix
pub const META_SUFFIX: &str = ".vgmeta";

pub const DEFAULT_KEY_ALIAS_BASE: &str = "vaultguard_secure_storage_key";

const KEY_CURRENT_ALIAS: &str = "current_alias";
const KEY_LAST_ROTATED_AT_MS: &str = "last_rotated_at_ms";

const ROTATION_DAYS: i64 = 90;
const ROTATION_INTERVAL_MS: i64 = ROTATION_DAYS * 24 * 60 * 60 * 1000;

/// Outcome of a blob+metadata composite save. The metadata step's result is
/// reported separately so callers can observe partial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    pub blob_saved: bool,
    pub metadata_saved: bool,
}

impl SaveOutcome {
    pub fn fully_saved(&self) -> bool {
        self.blob_saved && self.metadata_saved
    }
}

/// Secure Storage Engine
pub struct SecureStorage {
    dir: PathBuf,
    key_alias_base: String,
    keyvault: Arc<dyn KeyVault>,
    prefs: Arc<dyn PrefsStore>,
    /// Held across the whole rotation sweep and alias initialization.
    rotation_lock: Mutex<()>,
}

impl SecureStorage {
    pub fn new(
        dir: impl Into<PathBuf>,
        keyvault: Arc<dyn KeyVault>,
        prefs: Arc<dyn PrefsStore>,
    ) -> Self {
        Self::with_alias_base(dir, DEFAULT_KEY_ALIAS_BASE, keyvault, prefs)
    }

    pub fn with_alias_base(
        dir: impl Into<PathBuf>,
        key_alias_base: impl Into<String>,
        keyvault: Arc<dyn KeyVault>,
        prefs: Arc<dyn PrefsStore>,
    ) -> Self {
        Self {
            dir: dir.into(),
            key_alias_base: key_alias_base.into(),
            keyvault,
            prefs,
            rotation_lock: Mutex::new(()),
        }
    }

    /// Directory holding the encrypted files
    pub fn storage_dir(&self) -> &Path {
        &self.dir
    }

    // ═══════════════════════════════════════════════════════════════════════
    // DOCUMENT OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// Encrypt `data` under the current alias and store it as `{name}.vgenc`.
    /// Recoverable failures are reported as `false`, never thrown.
    pub fn save(&self, name: &str, data: &[u8]) -> bool {
        let path = self.blob_path(name);
        let alias = self.current_alias(now_ms());
        match self.encrypt_to_file(&path, &alias, data) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("save {name:?} failed: {e}");
                false
            }
        }
    }

    /// Store a document and its metadata record. Metadata failure after a
    /// successful blob save leaves partial state; both step results are
    /// visible in the returned [`SaveOutcome`].
    pub fn save_with_metadata(
        &self,
        name: &str,
        data: &[u8],
        metadata: &DocumentMetadata,
    ) -> SaveOutcome {
        let blob_saved = self.save(name, data);
        let metadata_saved = blob_saved && self.save_metadata(name, metadata);
        SaveOutcome {
            blob_saved,
            metadata_saved,
        }
    }

    /// Encrypt and store only the metadata record for `name`.
    pub fn save_metadata(&self, name: &str, metadata: &DocumentMetadata) -> bool {
        let path = self.meta_path(name);
        let alias = self.current_alias(now_ms());
        let result = metadata
            .to_json_bytes()
            .and_then(|plaintext| self.encrypt_to_file(&path, &alias, &plaintext));
        match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!("save metadata {name:?} failed: {e}");
                false
            }
        }
    }

    /// Load and decrypt a document. `Ok(None)` when the file does not exist;
    /// decrypt failures (tamper, wrong key, corrupt envelope) are surfaced
    /// as errors, distinct from "not found".
    pub fn load(&self, name: &str) -> VaultResult<Option<Vec<u8>>> {
        let path = self.blob_path(name);
        if !path.exists() {
            return Ok(None);
        }
        self.decrypt_from_file(&path).map(Some)
    }

    /// Load the metadata record for `name`. Absent file or an unparseable
    /// (e.g. older-schema) payload both yield `Ok(None)`; decrypt failures
    /// are real errors.
    pub fn get_metadata(&self, name: &str) -> VaultResult<Option<DocumentMetadata>> {
        let path = self.meta_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let plaintext = self.decrypt_from_file(&path)?;
        Ok(DocumentMetadata::from_json_bytes(&plaintext))
    }

    /// Delete blob and metadata. Succeeds if both are already absent.
    pub fn delete(&self, name: &str) -> bool {
        let ok_blob = self.remove_if_present(&self.blob_path(name));
        let ok_meta = self.remove_if_present(&self.meta_path(name));
        ok_blob && ok_meta
    }

    /// Sorted logical names, derived from `.vgenc` presence only.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .files_with_suffix(BLOB_SUFFIX)
            .into_iter()
            .filter_map(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.strip_suffix(BLOB_SUFFIX))
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        names
    }

    /// Sorted names whose metadata decrypts with a matching `type` field.
    /// Best-effort: records that fail to decrypt or parse are skipped.
    pub fn search_by_type(&self, doc_type: &str) -> Vec<String> {
        let normalized = doc_type.trim();
        if normalized.is_empty() {
            return Vec::new();
        }
        self.list()
            .into_iter()
            .filter(|name| {
                matches!(self.get_metadata(name), Ok(Some(meta)) if meta.doc_type == normalized)
            })
            .collect()
    }

    /// Migration helper: write a minimal metadata record for any blob that
    /// lacks one. Returns the number of files migrated.
    pub fn migrate_missing_metadata(&self, default_type: &str) -> usize {
        let mut migrated = 0;
        for name in self.list() {
            if self.meta_path(&name).exists() {
                continue;
            }
            let mut meta = DocumentMetadata::new(default_type);
            meta.display_name = Some(name.clone());
            if self.save_metadata(&name, &meta) {
                migrated += 1;
            }
        }
        migrated
    }

    // ═══════════════════════════════════════════════════════════════════════
    // KEY ROTATION
    // ═══════════════════════════════════════════════════════════════════════

    /// The currently active key alias. First call initializes `"{base}_v1"`
    /// and stamps the rotation clock.
    pub fn current_alias(&self, now_ms: i64) -> String {
        if let Some(alias) = self.prefs.get_str(KEY_CURRENT_ALIAS) {
            if !alias.is_empty() {
                return alias;
            }
        }
        let _guard = self.rotation_lock.lock();
        // Re-check under the lock; another thread may have initialized.
        if let Some(alias) = self.prefs.get_str(KEY_CURRENT_ALIAS) {
            if !alias.is_empty() {
                return alias;
            }
        }
        let alias = self.legacy_alias();
        self.prefs.put_str(KEY_CURRENT_ALIAS, &alias);
        self.prefs.put_i64(KEY_LAST_ROTATED_AT_MS, now_ms);
        alias
    }

    /// Rotate keys when due (90 days since the last rotation, or never
    /// rotated) and re-encrypt every stored file under the new alias.
    ///
    /// Each file is decrypted with its own embedded alias, so records left
    /// behind by earlier partial rotations still converge. Files that fail
    /// to decrypt are skipped and stay on their old key; they will be
    /// retried on the next due rotation. Returns the number of files
    /// migrated; the active alias advances only after the sweep.
    pub fn rotate_if_due(&self, now_ms: i64) -> VaultResult<usize> {
        let _guard = self.rotation_lock.lock();

        let last = self.prefs.get_i64(KEY_LAST_ROTATED_AT_MS).unwrap_or(0);
        let due = last == 0 || now_ms - last >= ROTATION_INTERVAL_MS;
        if !due {
            return Ok(0);
        }

        let new_alias = format!("{}_{}", self.key_alias_base, now_ms);
        // Key generation failure aborts the rotation before any rewrite.
        self.keyvault.ensure_key(&new_alias)?;

        let mut migrated = 0;
        let mut skipped = 0;
        for path in self.vault_files() {
            let plaintext = match self.decrypt_from_file(&path) {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("rotation: skipping {}: {e}", path.display());
                    skipped += 1;
                    continue;
                }
            };
            match self.encrypt_to_file(&path, &new_alias, &plaintext) {
                Ok(()) => migrated += 1,
                Err(e) => {
                    log::warn!("rotation: rewrite of {} failed: {e}", path.display());
                    skipped += 1;
                }
            }
        }

        self.prefs.put_str(KEY_CURRENT_ALIAS, &new_alias);
        self.prefs.put_i64(KEY_LAST_ROTATED_AT_MS, now_ms);

        if skipped > 0 {
            log::warn!("rotation: {skipped} file(s) left on their previous key");
        }
        log::info!("rotation complete: {migrated} file(s) now on alias {new_alias}");
        Ok(migrated)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // BACKUP / WIPE
    // ═══════════════════════════════════════════════════════════════════════

    /// Export an encrypted backup zip of all `.vgenc`/`.vgmeta` files,
    /// verbatim. No plaintext leaves the vault. Defaults to a timestamped
    /// archive in the system temp directory.
    pub fn export_backup(&self, destination: Option<&Path>) -> VaultResult<PathBuf> {
        let default_dest;
        let dest = match destination {
            Some(d) => d,
            None => {
                default_dest = std::env::temp_dir()
                    .join(format!("vaultguard_backup_{}.zip", now_ms()));
                &default_dest
            }
        };
        backup::export_encrypted_backup(&self.dir, dest)
    }

    /// Restore an encrypted backup zip. Existing files are skipped unless
    /// `overwrite`. Returns the number of files restored.
    pub fn restore_backup(&self, zip_path: &Path, overwrite: bool) -> VaultResult<usize> {
        backup::restore_encrypted_backup(zip_path, &self.dir, overwrite)
    }

    /// Delete every stored file; when `delete_keys`, also delete every key
    /// vault alias under this storage's base (failures swallowed). Rotation
    /// state is always cleared. Returns whether file deletion fully
    /// succeeded.
    pub fn wipe_all(&self, delete_keys: bool) -> bool {
        let _guard = self.rotation_lock.lock();

        let mut ok_files = true;
        if self.dir.exists() {
            match fs::read_dir(&self.dir) {
                Ok(entries) => {
                    for entry in entries.flatten() {
                        let path = entry.path();
                        if path.is_file() && !self.remove_if_present(&path) {
                            ok_files = false;
                        }
                    }
                }
                Err(e) => {
                    log::warn!("wipe: cannot list {}: {e}", self.dir.display());
                    ok_files = false;
                }
            }
        }

        if delete_keys {
            if let Ok(aliases) = self.keyvault.list_aliases() {
                for alias in aliases {
                    if alias.starts_with(&self.key_alias_base) {
                        if let Err(e) = self.keyvault.delete_key(&alias) {
                            log::warn!("wipe: key {alias} not deleted: {e}");
                        }
                    }
                }
            }
        }

        self.prefs.clear();
        ok_files
    }

    // ═══════════════════════════════════════════════════════════════════════
    // FILE HELPERS
    // ═══════════════════════════════════════════════════════════════════════

    fn legacy_alias(&self) -> String {
        format!("{}_v1", self.key_alias_base)
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}{BLOB_SUFFIX}", sanitize_name(name)))
    }

    fn meta_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}{META_SUFFIX}", sanitize_name(name)))
    }

    /// All encrypted vault files (`.vgenc` and `.vgmeta`)
    fn vault_files(&self) -> Vec<PathBuf> {
        let mut files = self.files_with_suffix(BLOB_SUFFIX);
        files.extend(self.files_with_suffix(META_SUFFIX));
        files.sort();
        files
    }

    fn files_with_suffix(&self, suffix: &str) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.ends_with(suffix))
            })
            .collect()
    }

    fn encrypt_to_file(&self, path: &Path, alias: &str, plaintext: &[u8]) -> VaultResult<()> {
        let key = self.keyvault.ensure_key(alias)?;
        let encrypted = encrypt_aes_gcm(&key, plaintext)?;
        let record = EncryptedRecord::v2(alias, encrypted.nonce, encrypted.ciphertext);
        self.write_atomic(path, &record.encode()?)
    }

    fn decrypt_from_file(&self, path: &Path) -> VaultResult<Vec<u8>> {
        let bytes = fs::read(path)?;
        let record = EncryptedRecord::decode(&bytes, &self.legacy_alias())?;
        let key = self.keyvault.ensure_key(&record.key_alias)?;
        decrypt_aes_gcm(&key, &record.nonce, &record.ciphertext)
    }

    /// Write to a temp file, fsync, then rename into place.
    fn write_atomic(&self, path: &Path, data: &[u8]) -> VaultResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("tmp");

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;

        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Zero-overwrite then unlink. Absent files count as removed.
    fn remove_if_present(&self, path: &Path) -> bool {
        if !path.exists() {
            return true;
        }
        if let Ok(metadata) = fs::metadata(path) {
            let size = metadata.len() as usize;
            if size > 0 {
                if let Ok(mut file) = OpenOptions::new().write(true).open(path) {
                    let zeros = vec![0u8; size.min(1024 * 1024)];
                    let mut remaining = size;
                    while remaining > 0 {
                        let to_write = remaining.min(zeros.len());
                        if file.write_all(&zeros[..to_write]).is_err() {
                            break;
                        }
                        remaining -= to_write;
                    }
                    let _ = file.sync_all();
                }
            }
        }
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("delete {} failed: {e}", path.display());
                false
            }
        }
    }
}

/// Restrict logical names to `[A-Za-z0-9._-]`; empty input becomes a
/// placeholder so callers can never address a file outside the vault dir.
pub fn sanitize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return "unnamed".to_string();
    }
    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_legacy_v1;
    use crate::keyvault::SoftwareKeyVault;
    use crate::state::MemoryPrefsStore;
    use tempfile::{tempdir, TempDir};

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    fn make_storage(root: &TempDir) -> SecureStorage {
        SecureStorage::new(
            root.path().join("storage"),
            Arc::new(SoftwareKeyVault::new(root.path().join("keys"))),
            Arc::new(MemoryPrefsStore::new()),
        )
    }

    #[test]
    fn test_save_load_roundtrip() {
        let root = tempdir().unwrap();
        let storage = make_storage(&root);

        assert!(storage.save("passport", b"document bytes"));
        let loaded = storage.load("passport").unwrap();
        assert_eq!(loaded.as_deref(), Some(b"document bytes".as_slice()));
    }

    #[test]
    fn test_load_absent_is_none() {
        let root = tempdir().unwrap();
        let storage = make_storage(&root);
        assert!(storage.load("ghost").unwrap().is_none());
    }

    #[test]
    fn test_tampered_blob_fails_authentication() {
        let root = tempdir().unwrap();
        let storage = make_storage(&root);
        storage.save("doc", b"payload payload payload");

        let path = storage.blob_path("doc");
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            storage.load("doc"),
            Err(VaultError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_metadata_roundtrip_and_partial_outcome() {
        let root = tempdir().unwrap();
        let storage = make_storage(&root);

        let meta = DocumentMetadata {
            display_name: Some("Concert ticket".into()),
            ..DocumentMetadata::new("TICKET")
        };
        let outcome = storage.save_with_metadata("ticket", b"qr-code", &meta);
        assert!(outcome.fully_saved());

        let back = storage.get_metadata("ticket").unwrap().unwrap();
        assert_eq!(back.doc_type, "TICKET");

        // Blob without metadata: listed, but metadata absent.
        storage.save("orphan", b"blob only");
        assert!(storage.list().contains(&"orphan".to_string()));
        assert!(storage.get_metadata("orphan").unwrap().is_none());
    }

    #[test]
    fn test_delete_absent_succeeds() {
        let root = tempdir().unwrap();
        let storage = make_storage(&root);
        assert!(storage.delete("never_existed"));

        storage.save("doc", b"bytes");
        assert!(storage.delete("doc"));
        assert!(storage.load("doc").unwrap().is_none());
    }

    #[test]
    fn test_list_is_sorted_and_blob_driven() {
        let root = tempdir().unwrap();
        let storage = make_storage(&root);

        storage.save("zeta", b"z");
        storage.save("alpha", b"a");
        // Metadata-only entry must not be listed.
        storage.save_metadata("meta_only", &DocumentMetadata::new("TICKET"));

        assert_eq!(storage.list(), vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn test_search_by_type_skips_unreadable() {
        let root = tempdir().unwrap();
        let storage = make_storage(&root);

        storage.save_with_metadata("p1", b"a", &DocumentMetadata::new("PASSPORT"));
        storage.save_with_metadata("t1", b"b", &DocumentMetadata::new("TICKET"));
        storage.save_with_metadata("p2", b"c", &DocumentMetadata::new("PASSPORT"));

        // Corrupt one metadata file; search must skip it silently.
        let path = storage.meta_path("p2");
        fs::write(&path, b"garbage").unwrap();

        assert_eq!(storage.search_by_type("PASSPORT"), vec!["p1".to_string()]);
        assert_eq!(storage.search_by_type("  "), Vec::<String>::new());
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  "), "unnamed");
        assert_eq!(sanitize_name("my doc/1"), "my_doc_1");
        assert_eq!(sanitize_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_name("fine-name_1.pdf"), "fine-name_1.pdf");
    }

    #[test]
    fn test_current_alias_initializes_once() {
        let root = tempdir().unwrap();
        let storage = make_storage(&root);

        let a1 = storage.current_alias(1_000);
        assert_eq!(a1, format!("{DEFAULT_KEY_ALIAS_BASE}_v1"));
        assert_eq!(storage.current_alias(2_000), a1);
    }

    #[test]
    fn test_rotation_not_due() {
        let root = tempdir().unwrap();
        let storage = make_storage(&root);
        storage.save("doc", b"bytes");

        let t0 = now_ms();
        let _ = storage.current_alias(t0);
        assert_eq!(storage.rotate_if_due(t0 + 10 * DAY_MS).unwrap(), 0);
    }

    #[test]
    fn test_rotation_converges_all_files() {
        let root = tempdir().unwrap();
        let storage = make_storage(&root);

        let t0 = 1_700_000_000_000;
        let _ = storage.current_alias(t0);
        storage.save_with_metadata("doc1", b"first", &DocumentMetadata::new("TICKET"));
        storage.save("doc2", b"second");

        let t1 = t0 + 91 * DAY_MS;
        // doc1 blob + doc1 meta + doc2 blob
        assert_eq!(storage.rotate_if_due(t1).unwrap(), 3);

        let new_alias = storage.current_alias(t1);
        assert_eq!(new_alias, format!("{DEFAULT_KEY_ALIAS_BASE}_{t1}"));

        for path in storage.vault_files() {
            let bytes = fs::read(&path).unwrap();
            let record = EncryptedRecord::decode(&bytes, &storage.legacy_alias()).unwrap();
            assert_eq!(record.key_alias, new_alias);
        }

        // Plaintexts unchanged.
        assert_eq!(storage.load("doc1").unwrap().unwrap(), b"first");
        assert_eq!(storage.load("doc2").unwrap().unwrap(), b"second");
    }

    #[test]
    fn test_rotation_skips_undecryptable_files() {
        let root = tempdir().unwrap();
        let storage = make_storage(&root);

        let t0 = 1_700_000_000_000;
        let _ = storage.current_alias(t0);
        storage.save("good", b"fine");
        storage.save("bad", b"will be corrupted");

        let bad_path = storage.blob_path("bad");
        let mut bytes = fs::read(&bad_path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&bad_path, &bytes).unwrap();

        let migrated = storage.rotate_if_due(t0 + 91 * DAY_MS).unwrap();
        assert_eq!(migrated, 1);
        assert_eq!(storage.load("good").unwrap().unwrap(), b"fine");
        // The corrupted file is still there, still unreadable.
        assert!(storage.load("bad").is_err());
    }

    #[test]
    fn test_legacy_v1_file_decodes_with_inferred_alias() {
        let root = tempdir().unwrap();
        let storage = make_storage(&root);

        // Craft a V1 envelope encrypted under the legacy alias.
        let key = storage.keyvault.ensure_key(&storage.legacy_alias()).unwrap();
        let encrypted = encrypt_aes_gcm(&key, b"pre-rotation document").unwrap();
        let v1_bytes = encode_legacy_v1(&encrypted.nonce, &encrypted.ciphertext);
        fs::create_dir_all(storage.storage_dir()).unwrap();
        fs::write(storage.blob_path("old_doc"), &v1_bytes).unwrap();

        let loaded = storage.load("old_doc").unwrap().unwrap();
        assert_eq!(loaded, b"pre-rotation document");
    }

    #[test]
    fn test_migrate_missing_metadata() {
        let root = tempdir().unwrap();
        let storage = make_storage(&root);

        storage.save("has_meta", b"a");
        storage.save_metadata("has_meta", &DocumentMetadata::new("PASSPORT"));
        storage.save("no_meta", b"b");

        assert_eq!(storage.migrate_missing_metadata("UNKNOWN"), 1);
        let meta = storage.get_metadata("no_meta").unwrap().unwrap();
        assert_eq!(meta.doc_type, "UNKNOWN");
        assert_eq!(meta.display_name.as_deref(), Some("no_meta"));
    }

    #[test]
    fn test_wipe_all_clears_files_keys_and_state() {
        let root = tempdir().unwrap();
        let storage = make_storage(&root);

        let t0 = 1_700_000_000_000;
        let alias = storage.current_alias(t0);
        storage.save_with_metadata("doc", b"bytes", &DocumentMetadata::new("TICKET"));
        assert!(storage.keyvault.exists(&alias));

        assert!(storage.wipe_all(true));
        assert!(storage.list().is_empty());
        assert!(!storage.keyvault.exists(&alias));

        // Rotation state reset: next call re-initializes the v1 alias.
        assert_eq!(storage.current_alias(t0), alias);
    }
}
