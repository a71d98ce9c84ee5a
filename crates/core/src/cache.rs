//! Per-adapter metadata and content cache
//!
//! Maps storage keys to the last-known state of each object. There is no
//! eviction, size bound or TTL: entries live until the key is deleted or the
//! cache is cleared. Each adapter owns exactly one cache.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use jiff::Timestamp;

/// Last-known state of one storage key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    content: Option<Vec<u8>>,
    size: u64,
    last_modified: Timestamp,
    version_tag: Option<String>,
}

impl CacheEntry {
    /// Entry carrying full content; the size is taken from the content
    pub fn with_content(
        content: Vec<u8>,
        last_modified: Timestamp,
        version_tag: Option<String>,
    ) -> Self {
        Self {
            size: content.len() as u64,
            content: Some(content),
            last_modified,
            version_tag,
        }
    }

    /// Entry carrying metadata only
    pub fn metadata(size: u64, last_modified: Timestamp, version_tag: Option<String>) -> Self {
        Self {
            content: None,
            size,
            last_modified,
            version_tag,
        }
    }

    /// Cached content, if a read or write populated it
    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    pub fn into_content(self) -> Option<Vec<u8>> {
        self.content
    }

    /// Byte length of the object
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Backend-reported or locally assigned modification time
    pub fn last_modified(&self) -> Timestamp {
        self.last_modified
    }

    /// Opaque backend version token (usually the ETag)
    pub fn version_tag(&self) -> Option<&str> {
        self.version_tag.as_deref()
    }
}

/// Key to [`CacheEntry`] mapping
///
/// Every call takes the lock for its own duration only. Read-modify-write
/// sequences in callers are not atomic, so concurrent writers to one key
/// resolve as last-writer-wins.
#[derive(Debug, Default)]
pub struct ObjectCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A panic while holding the lock cannot leave a half-written entry,
        // so a poisoned map is still consistent.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up an entry without touching the backend
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.lock().get(key).cloned()
    }

    /// Check for an entry without cloning it
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Insert or overwrite the entry for `key`
    pub fn put(&self, key: impl Into<String>, entry: CacheEntry) {
        self.lock().insert(key.into(), entry);
    }

    /// Remove the entry for `key`; absent keys are ignored
    pub fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_size_matches_content() {
        let entry = CacheEntry::with_content(b"hello".to_vec(), Timestamp::now(), None);
        assert_eq!(entry.size(), 5);
        assert_eq!(entry.content(), Some(&b"hello"[..]));

        let entry = CacheEntry::with_content("日本".as_bytes().to_vec(), Timestamp::now(), None);
        assert_eq!(entry.size(), 6);
    }

    #[test]
    fn test_metadata_entry_has_no_content() {
        let entry = CacheEntry::metadata(42, Timestamp::UNIX_EPOCH, Some("abc".into()));
        assert!(entry.content().is_none());
        assert_eq!(entry.size(), 42);
        assert_eq!(entry.version_tag(), Some("abc"));
        assert_eq!(entry.last_modified(), Timestamp::UNIX_EPOCH);
    }

    #[test]
    fn test_put_overwrites() {
        let cache = ObjectCache::new();
        cache.put("a", CacheEntry::metadata(1, Timestamp::UNIX_EPOCH, None));
        cache.put("a", CacheEntry::with_content(b"xyz".to_vec(), Timestamp::UNIX_EPOCH, None));

        let entry = cache.get("a").unwrap();
        assert_eq!(entry.size(), 3);
        assert_eq!(entry.content(), Some(&b"xyz"[..]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let cache = ObjectCache::new();
        cache.put("a", CacheEntry::metadata(1, Timestamp::UNIX_EPOCH, None));
        cache.remove("a");
        cache.remove("a");
        cache.remove("never-there");
        assert!(cache.get("a").is_none());
        assert!(!cache.contains("a"));
    }

    #[test]
    fn test_clear() {
        let cache = ObjectCache::new();
        cache.clear();
        assert!(cache.is_empty());

        cache.put("a", CacheEntry::metadata(1, Timestamp::UNIX_EPOCH, None));
        cache.put("b", CacheEntry::metadata(2, Timestamp::UNIX_EPOCH, None));
        assert_eq!(cache.len(), 2);

        cache.clear();
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("b").is_none());
    }
}
