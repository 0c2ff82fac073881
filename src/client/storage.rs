use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::ClientConfig;

/// Durable key/value entries owned by the client, one string per key.
pub trait LocalStorage: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
}

/// One `<key>.json` file per entry under `dir`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn from_config(cfg: &ClientConfig) -> io::Result<Self> {
        Self::new(cfg.favorites_dir.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl LocalStorage for FileStorage {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Writes and syncs a sibling temp file, then renames it over the entry.
    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        let mut file = File::create(&tmp)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &path)?;
        // Directory handles cannot be opened on every platform.
        if let Ok(dir) = File::open(&self.dir) {
            let _ = dir.sync_all();
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let storage = Self::default();
        storage
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        storage
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested")).unwrap();

        assert_eq!(storage.get("favorites").unwrap(), None);
        storage.set("favorites", "[]").unwrap();
        assert_eq!(storage.get("favorites").unwrap().as_deref(), Some("[]"));
        storage.set("favorites", "[1]").unwrap();
        assert_eq!(storage.get("favorites").unwrap().as_deref(), Some("[1]"));
        assert!(!storage.dir().join("favorites.json.tmp").exists());
    }

    #[test]
    fn leftover_temp_file_does_not_block_writes() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ClientConfig {
            api_url: "http://localhost:5000/".into(),
            favorites_dir: dir.path().to_path_buf(),
        };
        let storage = FileStorage::from_config(&cfg).unwrap();
        fs::write(dir.path().join("favorites.json.tmp"), "[{\"half").unwrap();

        assert_eq!(storage.get("favorites").unwrap(), None);
        storage.set("favorites", "[2]").unwrap();
        assert_eq!(storage.get("favorites").unwrap().as_deref(), Some("[2]"));
        assert!(!dir.path().join("favorites.json.tmp").exists());
    }

    #[test]
    fn memory_storage_overwrites() {
        let storage = MemoryStorage::with_entry("k", "a");
        storage.set("k", "b").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("b"));
        assert_eq!(storage.get("other").unwrap(), None);
    }
}
