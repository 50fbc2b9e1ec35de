//! VaultGuard Core - Persisted Key-Value State
//!
//! Small injected store for rotation and session state. Replaces the
//! original design's ambient process-wide preferences with an explicit
//! capability owned by the engine and the access gate, while keeping the
//! "survives process restart" semantics.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use parking_lot::RwLock;
use serde_json::Value;

/// String/int key-value persistence for durable vault state
pub trait PrefsStore: Send + Sync {
    fn get_str(&self, key: &str) -> Option<String>;
    fn put_str(&self, key: &str, value: &str);
    fn get_i64(&self, key: &str) -> Option<i64>;
    fn put_i64(&self, key: &str, value: i64);
    fn remove(&self, key: &str);
    fn clear(&self);
}

/// JSON-file-backed store with atomic writes and lenient loads (a missing
/// or corrupt file starts empty rather than failing the vault).
pub struct FilePrefsStore {
    path: PathBuf,
    cache: RwLock<BTreeMap<String, Value>>,
}

impl FilePrefsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();
        Self {
            path,
            cache: RwLock::new(cache),
        }
    }

    fn persist(&self, map: &BTreeMap<String, Value>) {
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let tmp = self.path.with_extension("json.tmp");
            let mut f = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            f.write_all(&serde_json::to_vec_pretty(map).unwrap_or_default())?;
            f.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();
        if let Err(e) = result {
            log::warn!("failed to persist prefs {}: {e}", self.path.display());
        }
    }

    fn put(&self, key: &str, value: Value) {
        let mut map = self.cache.write();
        map.insert(key.to_string(), value);
        self.persist(&map);
    }
}

impl PrefsStore for FilePrefsStore {
    fn get_str(&self, key: &str) -> Option<String> {
        self.cache
            .read()
            .get(key)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    fn put_str(&self, key: &str, value: &str) {
        self.put(key, Value::from(value));
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        self.cache.read().get(key).and_then(Value::as_i64)
    }

    fn put_i64(&self, key: &str, value: i64) {
        self.put(key, Value::from(value));
    }

    fn remove(&self, key: &str) {
        let mut map = self.cache.write();
        map.remove(key);
        self.persist(&map);
    }

    fn clear(&self) {
        let mut map = self.cache.write();
        map.clear();
        self.persist(&map);
    }
}

/// In-memory store for tests
#[derive(Default)]
pub struct MemoryPrefsStore {
    cache: RwLock<BTreeMap<String, Value>>,
}

impl MemoryPrefsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrefsStore for MemoryPrefsStore {
    fn get_str(&self, key: &str) -> Option<String> {
        self.cache
            .read()
            .get(key)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    fn put_str(&self, key: &str, value: &str) {
        self.cache.write().insert(key.to_string(), Value::from(value));
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        self.cache.read().get(key).and_then(Value::as_i64)
    }

    fn put_i64(&self, key: &str, value: i64) {
        self.cache.write().insert(key.to_string(), Value::from(value));
    }

    fn remove(&self, key: &str) {
        self.cache.write().remove(key);
    }

    fn clear(&self) {
        self.cache.write().clear();
    }
}
