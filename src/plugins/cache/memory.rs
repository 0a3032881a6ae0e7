//! In-memory cache back-end (spec.md §4.7 "Memory ... back-end").

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{CacheEntry, CacheStorage};
use crate::error::WayfarerError;

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        MemoryCache::default()
    }
}

impl CacheStorage for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, WayfarerError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, entry: CacheEntry, _ttl: Option<Duration>) -> Result<(), WayfarerError> {
        self.entries.lock().unwrap().insert(key.to_owned(), entry);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), WayfarerError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
