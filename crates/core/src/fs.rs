//! Filesystem facade over an object backend
//!
//! [`ObjectFs`] translates each filesystem call into a storage key, answers
//! from its cache when it can and otherwise makes one (or, for directory
//! deletion, a bounded sequence of) backend round-trips.

use std::collections::HashSet;

use async_trait::async_trait;
use jiff::Timestamp;

use crate::cache::{CacheEntry, ObjectCache};
use crate::config::AdapterConfig;
use crate::content_type::content_type_for;
use crate::error::{Error, Result};
use crate::path::KeyMapper;
use crate::traits::{BackendError, BucketInfo, FileStats, FileSystem, ObjectBackend, ObjectMeta};

/// Filesystem-style adapter over an [`ObjectBackend`]
pub struct ObjectFs<B> {
    backend: B,
    keys: KeyMapper,
    cache: ObjectCache,
    bucket: String,
    region: String,
}

impl<B: ObjectBackend> ObjectFs<B> {
    /// Wrap `backend` using the bucket identity and prefix from `config`
    pub fn new(backend: B, config: &AdapterConfig) -> Self {
        Self {
            backend,
            keys: KeyMapper::new(&config.prefix),
            cache: ObjectCache::new(),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
        }
    }

    /// Get the underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get this adapter's cache
    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    /// Storage key that `path` maps to
    pub fn key_for(&self, path: &str) -> String {
        self.keys.to_key(path)
    }

    /// Drop every cached entry
    pub fn clear_cache(&self) {
        self.cache.clear();
        tracing::debug!(bucket = %self.bucket, "cache cleared");
    }

    /// Configured bucket, region and namespace prefix
    pub fn bucket_info(&self) -> BucketInfo {
        BucketInfo {
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            prefix: self.keys.prefix().to_string(),
        }
    }

    /// Write any byte-like value
    pub async fn write(&self, path: &str, data: impl AsRef<[u8]>) -> Result<()> {
        self.write_file(path, Some(data.as_ref())).await
    }

    /// Fetch metadata and remember it
    async fn head_and_cache(&self, path: &str, key: String) -> Result<CacheEntry> {
        tracing::debug!(key = %key, "cache miss, issuing head");
        let meta = self
            .backend
            .head(&key)
            .await
            .map_err(|e| classify(path, e))?;
        let entry = metadata_entry(&meta);
        self.cache.put(key, entry.clone());
        Ok(entry)
    }
}

/// Map a backend failure onto the adapter's error kinds
fn classify(path: &str, err: BackendError) -> Error {
    if err.is_not_found() {
        Error::NotFound(path.to_string())
    } else {
        Error::backend(path, err.message)
    }
}

/// Missing size and time fall back to zero and now
fn metadata_entry(meta: &ObjectMeta) -> CacheEntry {
    CacheEntry::metadata(
        meta.size.unwrap_or(0),
        meta.last_modified.unwrap_or_else(Timestamp::now),
        meta.etag.clone(),
    )
}

#[async_trait]
impl<B: ObjectBackend> FileSystem for ObjectFs<B> {
    async fn exists(&self, path: &str) -> Result<bool> {
        let key = self.keys.to_key(path);
        if self.cache.contains(&key) {
            tracing::debug!(key = %key, "cache hit");
            return Ok(true);
        }

        match self.head_and_cache(path, key).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let key = self.keys.to_key(path);
        if let Some(content) = self.cache.get(&key).and_then(CacheEntry::into_content) {
            tracing::debug!(key = %key, "cache hit");
            return Ok(content);
        }

        tracing::debug!(key = %key, "cache miss, issuing get");
        let output = self
            .backend
            .get(&key)
            .await
            .map_err(|e| classify(path, e))?;

        let entry = CacheEntry::with_content(
            output.body.clone(),
            output.meta.last_modified.unwrap_or_else(Timestamp::now),
            output.meta.etag,
        );
        self.cache.put(key, entry);
        Ok(output.body)
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        let bytes = self.read(path).await?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }

    async fn write_file(&self, path: &str, data: Option<&[u8]>) -> Result<()> {
        let data = data.ok_or_else(|| {
            Error::InvalidArgument(format!("data is required to write '{path}'"))
        })?;

        let key = self.keys.to_key(path);
        let content_type = content_type_for(path);
        tracing::debug!(key = %key, size = data.len(), content_type = %content_type, "put");

        let output = self
            .backend
            .put(&key, data.to_vec(), &content_type)
            .await
            .map_err(|e| Error::backend(path, e.message))?;

        let entry = CacheEntry::with_content(data.to_vec(), Timestamp::now(), output.etag);
        self.cache.put(key, entry);
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let key = self.keys.to_key(path);
        self.cache.remove(&key);

        match self.backend.delete(&key).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!(key = %key, "delete of missing key ignored");
                Ok(())
            }
            Err(e) => Err(Error::backend(path, e.message)),
        }
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<String>> {
        let prefix = self.keys.to_dir_prefix(path);
        let listing = match self.backend.list(&prefix, Some('/')).await {
            Ok(listing) => listing,
            Err(e) if e.is_not_found() => {
                tracing::debug!(prefix = %prefix, "listing target missing, returning empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(Error::backend(path, e.message)),
        };

        let mut seen = HashSet::new();
        let mut names = Vec::new();

        for object in &listing.objects {
            let Some(name) = object.key.strip_prefix(prefix.as_str()) else {
                continue;
            };
            if name.is_empty() || name.contains('/') {
                continue;
            }
            if seen.insert(name.to_string()) {
                names.push(name.to_string());
            }
        }

        for common in &listing.common_prefixes {
            let Some(name) = common.strip_prefix(prefix.as_str()) else {
                continue;
            };
            let bare = name.trim_end_matches('/');
            if bare.is_empty() || bare.contains('/') {
                continue;
            }
            if seen.insert(name.to_string()) {
                names.push(name.to_string());
            }
        }

        Ok(names)
    }

    async fn ensure_dir(&self, path: &str) -> Result<()> {
        tracing::trace!(path, "ensure_dir is a no-op on object storage");
        Ok(())
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        let key = self.keys.to_key(path);
        let prefix = format!("{}/", key.trim_end_matches('/'));

        let listing = self
            .backend
            .list(&prefix, None)
            .await
            .map_err(|e| Error::backend(path, e.message))?;

        if listing.objects.is_empty() {
            tracing::debug!(prefix = %prefix, "nothing to delete");
            return Ok(());
        }

        for (deleted, object) in listing.objects.iter().enumerate() {
            self.cache.remove(&object.key);
            match self.backend.delete(&object.key).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    tracing::warn!(
                        prefix = %prefix,
                        key = %object.key,
                        deleted,
                        remaining = listing.objects.len() - deleted,
                        "directory delete stopped on failure"
                    );
                    return Err(Error::backend(
                        path,
                        format!("failed to delete '{}': {}", object.key, e.message),
                    ));
                }
            }
        }

        tracing::debug!(prefix = %prefix, count = listing.objects.len(), "directory deleted");
        Ok(())
    }

    async fn chmod(&self, path: &str, mode: u32) -> Result<()> {
        tracing::trace!(path, mode, "chmod is a no-op on object storage");
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<FileStats> {
        let key = self.keys.to_key(path);
        let entry = match self.cache.get(&key) {
            Some(entry) => {
                tracing::debug!(key = %key, "cache hit");
                entry
            }
            None => self.head_and_cache(path, key).await?,
        };
        Ok(FileStats::new(entry.size(), entry.last_modified()))
    }
}
