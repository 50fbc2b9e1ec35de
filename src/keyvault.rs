//! VaultGuard Core - Key Vault
//!
//! Symmetric key lifecycle behind an opaque capability boundary. Key
//! material never crosses the trait except as a [`VaultKey`] handle that
//! zeroizes on drop. Backends are selected at construction time; the
//! [`FallbackKeyVault`] chain tries a hardware-style primary and fails open
//! to software backing, never to a weaker algorithm.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::crypto::{VaultKey, KEY_LEN};
use crate::error::{VaultError, VaultResult};

const KEY_FILE_SUFFIX: &str = ".key";
const MAX_ALIAS_LEN: usize = 256;

/// Key lifecycle capability: create-if-absent, delete, existence checks.
pub trait KeyVault: Send + Sync {
    /// Fetch the key for `alias`, creating a fresh AES-256 key if absent.
    fn ensure_key(&self, alias: &str) -> VaultResult<VaultKey>;

    /// Delete the key for `alias`. Deleting an absent alias is not an error.
    fn delete_key(&self, alias: &str) -> VaultResult<()>;

    /// Whether a key exists for `alias`.
    fn exists(&self, alias: &str) -> bool;

    /// All aliases currently held. Supports prefix-scoped wipe.
    fn list_aliases(&self) -> VaultResult<Vec<String>>;
}

fn validate_alias(alias: &str) -> VaultResult<()> {
    let ok = !alias.is_empty()
        && alias.len() <= MAX_ALIAS_LEN
        && alias
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if ok {
        Ok(())
    } else {
        Err(VaultError::KeyVault(format!("invalid alias {alias:?}")))
    }
}

/// Software-backed key vault: one raw key file per alias inside a private
/// directory. The portable fallback backend for hosts without a hardware
/// keystore.
pub struct SoftwareKeyVault {
    dir: PathBuf,
    /// Serializes first-time key creation; without it two callers could
    /// race create-if-absent and end up holding different keys.
    creation_lock: Mutex<()>,
}

impl SoftwareKeyVault {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            creation_lock: Mutex::new(()),
        }
    }

    fn key_path(&self, alias: &str) -> PathBuf {
        self.dir.join(format!("{alias}{KEY_FILE_SUFFIX}"))
    }

    fn read_key(&self, path: &Path, alias: &str) -> VaultResult<Option<VaultKey>> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes =
            fs::read(path).map_err(|e| VaultError::KeyVault(format!("read {alias}: {e}")))?;
        let arr: [u8; KEY_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| VaultError::KeyVault(format!("corrupt key material for {alias}")))?;
        Ok(Some(VaultKey::new(arr)))
    }
}

impl KeyVault for SoftwareKeyVault {
    fn ensure_key(&self, alias: &str) -> VaultResult<VaultKey> {
        validate_alias(alias)?;
        let path = self.key_path(alias);

        if let Some(key) = self.read_key(&path, alias)? {
            return Ok(key);
        }

        let _guard = self.creation_lock.lock();
        // Re-check under the lock; another thread may have created it.
        if let Some(key) = self.read_key(&path, alias)? {
            return Ok(key);
        }

        let key = VaultKey::generate();
        fs::create_dir_all(&self.dir)
            .map_err(|e| VaultError::KeyVault(format!("create key dir: {e}")))?;

        // Write-temp-then-rename so a crash never leaves a short key file.
        // The temp name is randomized and opened with create_new so a
        // concurrent process can never share or truncate it.
        let tmp = self
            .dir
            .join(format!(".{alias}.{:08x}.tmp", rand::random::<u32>()));
        let write = (|| -> std::io::Result<()> {
            let mut f = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp)?;
            f.write_all(key.expose())?;
            f.sync_all()?;
            fs::rename(&tmp, &path)
        })();
        write.map_err(|e| VaultError::KeyVault(format!("persist {alias}: {e}")))?;

        // Return what actually landed on disk, so every caller holds the
        // key future reads will resolve to.
        self.read_key(&path, alias)?
            .ok_or_else(|| VaultError::KeyVault(format!("key file for {alias} vanished")))
    }

    fn delete_key(&self, alias: &str) -> VaultResult<()> {
        validate_alias(alias)?;
        let path = self.key_path(alias);
        if !path.exists() {
            return Ok(());
        }

        // Overwrite key material before unlinking.
        if let Ok(mut f) = OpenOptions::new().write(true).open(&path) {
            let _ = f.write_all(&[0u8; KEY_LEN]);
            let _ = f.sync_all();
        }
        fs::remove_file(&path)
            .map_err(|e| VaultError::KeyVault(format!("delete {alias}: {e}")))
    }

    fn exists(&self, alias: &str) -> bool {
        self.key_path(alias).exists()
    }

    fn list_aliases(&self) -> VaultResult<Vec<String>> {
        let mut aliases = Vec::new();
        if !self.dir.exists() {
            return Ok(aliases);
        }
        for entry in
            fs::read_dir(&self.dir).map_err(|e| VaultError::KeyVault(format!("list: {e}")))?
        {
            let entry = entry.map_err(|e| VaultError::KeyVault(format!("list: {e}")))?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(alias) = name.strip_suffix(KEY_FILE_SUFFIX) {
                    aliases.push(alias.to_string());
                }
            }
        }
        aliases.sort();
        Ok(aliases)
    }
}

/// Fallback chain over two backends: try the primary (hardware-backed where
/// available), recover from provisioning failures with the fallback.
/// Generation failures on both backends are fatal to the operation.
pub struct FallbackKeyVault {
    primary: Arc<dyn KeyVault>,
    fallback: Arc<dyn KeyVault>,
}

impl FallbackKeyVault {
    pub fn new(primary: Arc<dyn KeyVault>, fallback: Arc<dyn KeyVault>) -> Self {
        Self { primary, fallback }
    }
}

impl KeyVault for FallbackKeyVault {
    fn ensure_key(&self, alias: &str) -> VaultResult<VaultKey> {
        // A key that already exists must keep resolving through the backend
        // that holds it, otherwise decrypt would silently use a fresh key.
        if self.fallback.exists(alias) && !self.primary.exists(alias) {
            return self.fallback.ensure_key(alias);
        }
        match self.primary.ensure_key(alias) {
            Ok(key) => Ok(key),
            Err(e) => {
                log::warn!("primary keyvault failed for {alias}: {e}; falling back");
                self.fallback.ensure_key(alias)
            }
        }
    }

    fn delete_key(&self, alias: &str) -> VaultResult<()> {
        let r1 = self.primary.delete_key(alias);
        let r2 = self.fallback.delete_key(alias);
        r1.and(r2)
    }

    fn exists(&self, alias: &str) -> bool {
        self.primary.exists(alias) || self.fallback.exists(alias)
    }

    fn list_aliases(&self) -> VaultResult<Vec<String>> {
        // Propagate either backend's failure; a partial listing would let a
        // prefix-scoped wipe silently miss keys held by the broken backend.
        let mut aliases = self.primary.list_aliases()?;
        aliases.extend(self.fallback.list_aliases()?);
        aliases.sort();
        aliases.dedup();
        Ok(aliases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_key_is_stable() {
        let dir = tempdir().unwrap();
        let kv = SoftwareKeyVault::new(dir.path());

        let k1 = kv.ensure_key("vaultguard_key_v1").unwrap();
        let k2 = kv.ensure_key("vaultguard_key_v1").unwrap();
        assert_eq!(k1.expose(), k2.expose());

        let other = kv.ensure_key("vaultguard_key_2").unwrap();
        assert_ne!(k1.expose(), other.expose());
    }

    #[test]
    fn test_delete_and_exists() {
        let dir = tempdir().unwrap();
        let kv = SoftwareKeyVault::new(dir.path());

        kv.ensure_key("a1").unwrap();
        assert!(kv.exists("a1"));

        kv.delete_key("a1").unwrap();
        assert!(!kv.exists("a1"));

        // Deleting an absent alias succeeds.
        kv.delete_key("a1").unwrap();
    }

    #[test]
    fn test_invalid_alias_rejected() {
        let dir = tempdir().unwrap();
        let kv = SoftwareKeyVault::new(dir.path());

        assert!(kv.ensure_key("").is_err());
        assert!(kv.ensure_key("../escape").is_err());
        assert!(kv.ensure_key(&"x".repeat(257)).is_err());
    }

    #[test]
    fn test_list_aliases_by_prefix() {
        let dir = tempdir().unwrap();
        let kv = SoftwareKeyVault::new(dir.path());

        kv.ensure_key("base_v1").unwrap();
        kv.ensure_key("base_170000").unwrap();
        kv.ensure_key("other").unwrap();

        let aliases = kv.list_aliases().unwrap();
        assert_eq!(aliases.iter().filter(|a| a.starts_with("base")).count(), 2);
    }

    #[test]
    fn test_concurrent_first_creation_yields_one_key() {
        use std::sync::Barrier;
        use std::thread;

        // First-time creation of the same alias from two threads must hand
        // both callers the key that ended up on disk, with no error.
        for _ in 0..16 {
            let dir = tempdir().unwrap();
            let kv = Arc::new(SoftwareKeyVault::new(dir.path()));
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let kv = Arc::clone(&kv);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        kv.ensure_key("race_alias").unwrap()
                    })
                })
                .collect();

            let keys: Vec<VaultKey> =
                handles.into_iter().map(|h| h.join().unwrap()).collect();
            assert_eq!(keys[0].expose(), keys[1].expose());

            let persisted = kv.ensure_key("race_alias").unwrap();
            assert_eq!(persisted.expose(), keys[0].expose());
        }
    }

    struct FailingVault;

    impl KeyVault for FailingVault {
        fn ensure_key(&self, _alias: &str) -> VaultResult<VaultKey> {
            Err(VaultError::KeyVault("provisioning failed".into()))
        }
        fn delete_key(&self, _alias: &str) -> VaultResult<()> {
            Ok(())
        }
        fn exists(&self, _alias: &str) -> bool {
            false
        }
        fn list_aliases(&self) -> VaultResult<Vec<String>> {
            Err(VaultError::KeyVault("listing failed".into()))
        }
    }

    #[test]
    fn test_fallback_chain_fails_open_to_software() {
        let dir = tempdir().unwrap();
        let chain = FallbackKeyVault::new(
            Arc::new(FailingVault),
            Arc::new(SoftwareKeyVault::new(dir.path())),
        );

        let k1 = chain.ensure_key("alias_v1").unwrap();
        let k2 = chain.ensure_key("alias_v1").unwrap();
        assert_eq!(k1.expose(), k2.expose());
        assert!(chain.exists("alias_v1"));
    }

    #[test]
    fn test_chain_listing_propagates_backend_failure() {
        let dir = tempdir().unwrap();
        let software = Arc::new(SoftwareKeyVault::new(dir.path()));
        software.ensure_key("base_v1").unwrap();

        // A broken backend must surface, not yield a partial listing.
        let chain = FallbackKeyVault::new(Arc::new(FailingVault), software);
        assert!(chain.list_aliases().is_err());
    }
}
