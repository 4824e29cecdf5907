//! Key-value cache collaborator
//!
//! The data-access layer only needs `get`/`set`; expiry and storage are the
//! implementation's business. Values are JSON so any serde type can be stored.

use std::cell::RefCell;
use std::collections::HashMap;

pub use serde_json::Value as CacheValue;

/// External cache used to memoize the table list and per-table schemas.
pub trait Cache {
    fn get(&self, key: &str) -> Option<CacheValue>;
    fn set(&self, key: &str, value: CacheValue);
}

/// Process-local cache backed by a `HashMap`. Entries never expire.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RefCell<HashMap<String, CacheValue>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn remove(&self, key: &str) -> Option<CacheValue> {
        self.entries.borrow_mut().remove(key)
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheValue> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: CacheValue) {
        self.entries.borrow_mut().insert(key.to_string(), value);
    }
}

/// Cache that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl Cache for NoCache {
    fn get(&self, _key: &str) -> Option<CacheValue> {
        None
    }

    fn set(&self, _key: &str, _value: CacheValue) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_cache() {
        let cache = MemoryCache::new();
        assert!(cache.get("tables").is_none());
        cache.set("tables", json!(["widget"]));
        assert_eq!(cache.get("tables"), Some(json!(["widget"])));
        assert_eq!(cache.len(), 1);
        cache.remove("tables");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_no_cache_forgets() {
        NoCache.set("tables", json!([]));
        assert!(NoCache.get("tables").is_none());
    }
}
