//! Persisted "live fingerprint" record per logical index.

use std::collections::BTreeMap;
use std::path::PathBuf;

use parking_lot::RwLock;

use crate::types::SyncResult;

/// Key-value store holding the fingerprint of each deployed index.
pub trait FingerprintStore: Send + Sync {
    /// Fingerprint recorded for `logical_name`, if any.
    fn get(&self, logical_name: &str) -> SyncResult<Option<String>>;

    /// Replace the fingerprint recorded for `logical_name`.
    fn set(&self, logical_name: &str, fingerprint: &str) -> SyncResult<()>;

    /// All recorded fingerprints.
    fn entries(&self) -> SyncResult<BTreeMap<String, String>>;
}

/// Fingerprints kept in memory only.
#[derive(Default)]
pub struct MemoryFingerprintStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FingerprintStore for MemoryFingerprintStore {
    fn get(&self, logical_name: &str) -> SyncResult<Option<String>> {
        Ok(self.entries.read().get(logical_name).cloned())
    }

    fn set(&self, logical_name: &str, fingerprint: &str) -> SyncResult<()> {
        self.entries
            .write()
            .insert(logical_name.to_string(), fingerprint.to_string());
        Ok(())
    }

    fn entries(&self) -> SyncResult<BTreeMap<String, String>> {
        Ok(self.entries.read().clone())
    }
}

/// Fingerprints stored as a JSON object in a file.
///
/// The file is read on every call so separate processes observe each
/// other's locks; a missing file means nothing has been deployed yet.
pub struct FileFingerprintStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileFingerprintStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    fn load(&self) -> SyncResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = std::fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&data)?)
    }
}

impl FingerprintStore for FileFingerprintStore {
    fn get(&self, logical_name: &str) -> SyncResult<Option<String>> {
        let _guard = self.lock.read();
        Ok(self.load()?.remove(logical_name))
    }

    fn set(&self, logical_name: &str, fingerprint: &str) -> SyncResult<()> {
        let _guard = self.lock.write();
        let mut entries = self.load()?;
        entries.insert(logical_name.to_string(), fingerprint.to_string());
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn entries(&self) -> SyncResult<BTreeMap<String, String>> {
        let _guard = self.lock.read();
        self.load()
    }
}
