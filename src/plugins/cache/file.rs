//! On-disk cache back-end (spec.md §4.7 "... and File back-ends"). Each
//! entry is one JSON file under `dir`, named by a hash of the cache key so
//! arbitrary URLs never have to survive as filesystem paths.

use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{CacheEntry, CacheStorage};
use crate::error::WayfarerError;

pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileCache { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        self.dir.join(format!("{:016x}.json", hasher.finish()))
    }
}

fn io_err(path: &Path, err: std::io::Error) -> WayfarerError {
    WayfarerError::Plugin(format!("cache file {}: {}", path.display(), err))
}

impl CacheStorage for FileCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, WayfarerError> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => {
                let entry = serde_json::from_slice(&bytes)
                    .map_err(|e| WayfarerError::Plugin(format!("corrupt cache entry: {e}")))?;
                Ok(Some(entry))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    fn set(&self, key: &str, entry: CacheEntry, _ttl: Option<Duration>) -> Result<(), WayfarerError> {
        fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        let path = self.path_for(key);
        let bytes = serde_json::to_vec(&entry)
            .map_err(|e| WayfarerError::Plugin(format!("cache entry not serializable: {e}")))?;
        fs::write(&path, bytes).map_err(|e| io_err(&path, e))
    }

    fn delete(&self, key: &str) -> Result<(), WayfarerError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> CacheEntry {
        CacheEntry {
            status: 200,
            headers: vec![("content-type".to_owned(), "text/plain".to_owned())],
            body: b"disk cached".to_vec(),
            etag: Some("\"v1\"".to_owned()),
            last_modified: None,
            fresh_until: None,
            stale_while_revalidate_until: None,
            stale_if_error_until: None,
            vary: Vec::new(),
            vary_values: Vec::new(),
        }
    }

    #[test]
    fn round_trips_an_entry_through_disk() {
        let dir = std::env::temp_dir().join(format!("wayfarer-cache-test-{:x}", rand::random::<u64>()));
        let store = FileCache::new(&dir);
        store.set("https://x/y", sample_entry(), None).unwrap();
        let loaded = store.get("https://x/y").unwrap().unwrap();
        assert_eq!(loaded.body, b"disk cached");
        store.delete("https://x/y").unwrap();
        assert!(store.get("https://x/y").unwrap().is_none());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_key_is_not_an_error() {
        let dir = std::env::temp_dir().join(format!("wayfarer-cache-test-{:x}", rand::random::<u64>()));
        let store = FileCache::new(&dir);
        assert!(store.get("nope").unwrap().is_none());
    }
}
