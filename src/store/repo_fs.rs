//! Local durable storage backends: one file per key, or an in-process map.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use crate::common::config::AppCfg;
use crate::common::error::{SyncError, SyncResult};

use super::domain::LocalStorage;

/// Filesystem storage rooted at `cfg.data_root/local`.
pub struct FsLocalStorage {
    root: PathBuf,
}

impl FsLocalStorage {
    pub fn new(cfg: &AppCfg) -> Self {
        Self::at(cfg.local_dir())
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, key: &str) -> SyncResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(SyncError::invalid(format!("bad storage key `{key}`")));
        }
        Ok(self.root.join(format!("{key}.json")))
    }

    fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }
}

impl LocalStorage for FsLocalStorage {
    fn get(&self, key: &str) -> SyncResult<Option<String>> {
        let path = self.entry_path(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(SyncError::storage(key, err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        let path = self.entry_path(key)?;
        self.ensure_dirs().map_err(|err| SyncError::storage(key, err))?;

        // Readers only ever see a complete entry; a failed write leaves no temp file behind.
        let mut temp =
            NamedTempFile::new_in(&self.root).map_err(|err| SyncError::storage(key, err))?;
        temp.write_all(value.as_bytes())
            .map_err(|err| SyncError::storage(key, err))?;
        temp.as_file()
            .sync_all()
            .map_err(|err| SyncError::storage(key, err))?;
        temp.persist(&path)
            .map(|_| ())
            .map_err(|err| SyncError::storage(key, err.error))
    }

    fn remove(&self, key: &str) -> SyncResult<()> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(SyncError::storage(key, err)),
        }
    }
}

/// Volatile storage for tests and hosts without a writable disk.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> SyncResult<()> {
        self.lock().remove(key);
        Ok(())
    }
}
