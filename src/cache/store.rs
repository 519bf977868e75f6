//! Key/value substrates the cache can sit on
//!
//! A substrate is a flat string-keyed store of text values that may be shared
//! with data the cache does not own. The cache only touches keys under its
//! namespace prefix.

use directories::ProjectDirs;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by a storage substrate
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing storage failed
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The write would push the store past its byte quota
    #[error("storage quota exceeded: {needed} bytes needed, limit is {limit}")]
    QuotaExceeded { needed: usize, limit: usize },
}

/// A flat string-keyed text store
pub trait Substrate: Send {
    /// Returns the raw value under `key`, or `None` if absent
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value
    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Deletes `key`; deleting an absent key is not an error
    fn delete(&mut self, key: &str) -> Result<(), StoreError>;

    /// Lists every key currently present, in ascending order
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// In-process substrate, optionally bounded by a byte quota
///
/// The quota counts key and value bytes together, the way browser storage does.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    items: BTreeMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that rejects writes once `quota_bytes` would be exceeded
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: BTreeMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn used_bytes(&self) -> usize {
        self.items.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl Substrate for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.items.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(limit) = self.quota_bytes {
            let replaced = self.items.get(key).map_or(0, |v| key.len() + v.len());
            let needed = self.used_bytes() - replaced + key.len() + value.len();
            if needed > limit {
                return Err(StoreError::QuotaExceeded { needed, limit });
            }
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.items.keys().cloned().collect())
    }
}

/// Directory-backed substrate storing one `.json` file per key
///
/// Uses `~/.cache/reelcache/` on Linux (or the XDG equivalent) unless a
/// directory is given explicitly.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Directory where entry files are stored
    dir: PathBuf,
}

impl FileStore {
    /// Creates a FileStore in the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "reelcache")?;
        Some(Self::with_dir(project_dirs.cache_dir().to_path_buf()))
    }

    /// Creates a FileStore rooted at a custom directory
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path to the file holding `key`
    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }
}

impl Substrate for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.entry_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.entry_path(key), value)?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if let Some(key) = decode_key(stem) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn is_plain(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.')
}

/// Percent-escapes every byte that is not safe in a file name
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for &b in key.as_bytes() {
        if is_plain(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Reverses `encode_key`; returns `None` for names it could not have produced
fn decode_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    let key = String::from_utf8(out).ok()?;
    (encode_key(&key) == name).then_some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::with_dir(temp_dir.path().to_path_buf());
        (store, temp_dir)
    }

    #[test]
    fn test_memory_store_lists_keys_in_order() {
        let mut store = MemoryStore::new();
        store.write("b", "2").unwrap();
        store.write("a", "1").unwrap();
        store.write("c", "3").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(store.read("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_memory_store_delete_missing_is_ok() {
        let mut store = MemoryStore::new();
        assert!(store.delete("nothing").is_ok());
    }

    #[test]
    fn test_memory_store_quota_rejects_oversized_write() {
        let mut store = MemoryStore::with_quota(10);
        store.write("k", "12345").unwrap();

        let result = store.write("other", "123456789");
        assert!(matches!(
            result,
            Err(StoreError::QuotaExceeded { limit: 10, .. })
        ));
        assert_eq!(store.keys().unwrap(), vec!["k"]);
    }

    #[test]
    fn test_memory_store_quota_counts_replaced_value_once() {
        let mut store = MemoryStore::with_quota(10);
        store.write("k", "123456789").unwrap();
        // Replacing the same key must not double count the old value
        store.write("k", "987654321").unwrap();
        assert_eq!(store.read("k").unwrap().as_deref(), Some("987654321"));
    }

    #[test]
    fn test_file_store_write_creates_file_in_directory() {
        let (mut store, temp_dir) = create_test_store();
        store.write("test_key", "{\"a\":1}").unwrap();

        let expected_path = temp_dir.path().join("test_key.json");
        assert!(expected_path.exists(), "Entry file should exist");
        assert_eq!(store.read("test_key").unwrap().as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_file_store_read_missing_is_none() {
        let (store, _temp_dir) = create_test_store();
        assert!(store.read("nonexistent_key").unwrap().is_none());
    }

    #[test]
    fn test_file_store_creates_nested_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let nested_path = temp_dir.path().join("nested").join("cache");
        let mut store = FileStore::with_dir(nested_path.clone());

        store.write("nested_key", "1").unwrap();
        assert!(nested_path.join("nested_key.json").exists());
    }

    #[test]
    fn test_file_store_keys_round_trip_unsafe_characters() {
        let (mut store, _temp_dir) = create_test_store();
        store.write("search_star wars/ep%4", "1").unwrap();
        store.write("plain", "2").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["plain", "search_star wars/ep%4"]);
        assert_eq!(
            store.read("search_star wars/ep%4").unwrap().as_deref(),
            Some("1")
        );
    }

    #[test]
    fn test_file_store_keys_ignores_foreign_files() {
        let (store, temp_dir) = create_test_store();
        fs::write(temp_dir.path().join("notes.txt"), "x").unwrap();
        fs::write(temp_dir.path().join("bad%zz.json"), "x").unwrap();

        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_keys_skips_non_canonical_names() {
        let (mut store, temp_dir) = create_test_store();
        store.write("netflix_cache_a", "1").unwrap();
        fs::write(temp_dir.path().join("netflix_cache_%61.json"), "x").unwrap();
        fs::write(temp_dir.path().join("search%2fx.json"), "x").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["netflix_cache_a"]);
        assert_eq!(decode_key("netflix_cache_%61"), None);
        assert_eq!(decode_key("a%2Fb").as_deref(), Some("a/b"));
    }

    #[test]
    fn test_file_store_keys_on_missing_directory_is_empty() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::with_dir(temp_dir.path().join("never_created"));
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_delete_is_idempotent() {
        let (mut store, _temp_dir) = create_test_store();
        store.write("gone", "1").unwrap();
        store.delete("gone").unwrap();
        store.delete("gone").unwrap();
        assert!(store.read("gone").unwrap().is_none());
    }

    #[test]
    fn test_new_creates_xdg_compliant_path() {
        if let Some(store) = FileStore::new() {
            let path_str = store.dir().to_string_lossy();
            assert!(
                path_str.contains("reelcache"),
                "Cache path should contain project name"
            );
        }
        // Test passes if new() returns None (e.g., no home directory in CI)
    }
}
