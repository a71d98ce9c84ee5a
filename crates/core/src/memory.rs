//! In-process object backend
//!
//! Stores objects in a sorted map and mimics S3 semantics closely enough to
//! run filesystem code without a server: missing keys are `NotFound` on get
//! and head, deletes of missing keys succeed, and listings honour the
//! delimiter.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use jiff::Timestamp;

use crate::traits::{
    BackendError, BackendResult, GetOutput, Listing, ObjectBackend, ObjectMeta, ObjectSummary,
    PutOutput,
};

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    content_type: String,
    last_modified: Timestamp,
    etag: String,
}

impl StoredObject {
    fn meta(&self) -> ObjectMeta {
        ObjectMeta {
            size: Some(self.body.len() as u64),
            last_modified: Some(self.last_modified),
            etag: Some(self.etag.clone()),
            content_type: Some(self.content_type.clone()),
        }
    }
}

/// Number of calls made to each backend operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub put: usize,
    pub delete: usize,
    pub head: usize,
    pub list: usize,
}

#[derive(Debug, Default)]
struct Counters {
    get: AtomicUsize,
    put: AtomicUsize,
    delete: AtomicUsize,
    head: AtomicUsize,
    list: AtomicUsize,
}

/// [`ObjectBackend`] kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    next_etag: AtomicU64,
    counters: Counters,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Calls made so far, per operation
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            get: self.counters.get.load(Ordering::Relaxed),
            put: self.counters.put.load(Ordering::Relaxed),
            delete: self.counters.delete.load(Ordering::Relaxed),
            head: self.counters.head.load(Ordering::Relaxed),
            list: self.counters.list.load(Ordering::Relaxed),
        }
    }

    /// Every stored key, in order
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Content type recorded for `key`
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.lock().get(key).map(|o| o.content_type.clone())
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    async fn get(&self, key: &str) -> BackendResult<GetOutput> {
        self.counters.get.fetch_add(1, Ordering::Relaxed);
        let objects = self.lock();
        let object = objects
            .get(key)
            .ok_or_else(|| BackendError::not_found(format!("NoSuchKey: {key}")))?;
        Ok(GetOutput {
            body: object.body.clone(),
            meta: object.meta(),
        })
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> BackendResult<PutOutput> {
        self.counters.put.fetch_add(1, Ordering::Relaxed);
        let etag = format!("{:032x}", self.next_etag.fetch_add(1, Ordering::Relaxed) + 1);
        let object = StoredObject {
            body,
            content_type: content_type.to_string(),
            last_modified: Timestamp::now(),
            etag: etag.clone(),
        };
        self.lock().insert(key.to_string(), object);
        Ok(PutOutput { etag: Some(etag) })
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        self.counters.delete.fetch_add(1, Ordering::Relaxed);
        self.lock().remove(key);
        Ok(())
    }

    async fn head(&self, key: &str) -> BackendResult<ObjectMeta> {
        self.counters.head.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .get(key)
            .map(StoredObject::meta)
            .ok_or_else(|| BackendError::not_found(format!("NotFound: {key}")))
    }

    async fn list(&self, prefix: &str, delimiter: Option<char>) -> BackendResult<Listing> {
        self.counters.list.fetch_add(1, Ordering::Relaxed);
        let objects = self.lock();

        let mut listing = Listing::default();
        let mut groups = BTreeSet::new();

        let under_prefix = objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix));
        for (key, object) in under_prefix {
            let rest = &key[prefix.len()..];
            if let Some((d, pos)) = delimiter.and_then(|d| rest.find(d).map(|pos| (d, pos))) {
                let end = prefix.len() + pos + d.len_utf8();
                groups.insert(key[..end].to_string());
                continue;
            }
            listing.objects.push(ObjectSummary {
                key: key.clone(),
                size: object.body.len() as u64,
                last_modified: Some(object.last_modified),
                etag: Some(object.etag.clone()),
            });
        }

        listing.common_prefixes = groups.into_iter().collect();
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> MemoryBackend {
        let backend = MemoryBackend::new();
        for key in ["docs/a.md", "docs/b.md", "docs/guides/intro.md", "docs/guides/faq.md", "top.txt"] {
            backend.put(key, b"x".to_vec(), "text/plain").await.unwrap();
        }
        backend
    }

    #[tokio::test]
    async fn test_get_and_head_missing() {
        let backend = MemoryBackend::new();
        assert!(backend.get("nope").await.unwrap_err().is_not_found());
        assert!(backend.head("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_put_assigns_distinct_etags() {
        let backend = MemoryBackend::new();
        let first = backend.put("k", b"1".to_vec(), "text/plain").await.unwrap();
        let second = backend.put("k", b"22".to_vec(), "text/plain").await.unwrap();
        assert_ne!(first.etag, second.etag);

        let meta = backend.head("k").await.unwrap();
        assert_eq!(meta.size, Some(2));
        assert_eq!(meta.etag, second.etag);
    }

    #[tokio::test]
    async fn test_delete_missing_succeeds() {
        let backend = MemoryBackend::new();
        assert!(backend.delete("nope").await.is_ok());
    }

    #[tokio::test]
    async fn test_list_with_delimiter() {
        let backend = seeded().await;
        let listing = backend.list("docs/", Some('/')).await.unwrap();

        let keys: Vec<_> = listing.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["docs/a.md", "docs/b.md"]);
        assert_eq!(listing.common_prefixes, vec!["docs/guides/"]);
    }

    #[tokio::test]
    async fn test_list_recursive() {
        let backend = seeded().await;
        let listing = backend.list("docs/", None).await.unwrap();
        assert_eq!(listing.objects.len(), 4);
        assert!(listing.common_prefixes.is_empty());

        let root = backend.list("", Some('/')).await.unwrap();
        assert_eq!(root.objects.len(), 1);
        assert_eq!(root.common_prefixes, vec!["docs/"]);
    }

    #[tokio::test]
    async fn test_list_with_multibyte_delimiter() {
        let backend = MemoryBackend::new();
        for key in ["aéb", "aéc/d", "plain"] {
            backend.put(key, b"x".to_vec(), "text/plain").await.unwrap();
        }

        let listing = backend.list("", Some('é')).await.unwrap();
        let keys: Vec<_> = listing.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["plain"]);
        assert_eq!(listing.common_prefixes, vec!["aé"]);

        let nested = backend.list("aé", Some('/')).await.unwrap();
        assert_eq!(nested.objects.len(), 1);
        assert_eq!(nested.common_prefixes, vec!["aéc/"]);
    }

    #[tokio::test]
    async fn test_call_counts() {
        let backend = seeded().await;
        backend.get("top.txt").await.unwrap();
        backend.head("top.txt").await.unwrap();
        backend.list("", None).await.unwrap();
        backend.delete("top.txt").await.unwrap();

        let calls = backend.calls();
        assert_eq!(
            calls,
            CallCounts {
                get: 1,
                put: 5,
                delete: 1,
                head: 1,
                list: 1,
            }
        );
        assert_eq!(backend.keys().len(), 4);
        assert_eq!(backend.content_type("docs/a.md").as_deref(), Some("text/plain"));
    }
}
