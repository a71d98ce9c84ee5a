//! Backend and filesystem trait definitions
//!
//! [`ObjectBackend`] is the five-call surface the adapter needs from object
//! storage. It keeps the filesystem layer independent of any SDK and can be
//! mocked for testing. [`FileSystem`] is what application code programs
//! against.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Result;

/// Classification of a backend failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// The key (or bucket) does not exist
    NotFound,
    /// Credentials were rejected or lack permission
    AccessDenied,
    /// The backend's own timeout policy gave up
    Timeout,
    /// Anything else: network, throttling, service faults
    Other,
}

/// Failure reported by an [`ObjectBackend`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NotFound, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Other, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == BackendErrorKind::NotFound
    }
}

/// Result type alias for backend calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Object metadata as reported by HEAD or GET
///
/// Every field is optional because backends are not required to send them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size: Option<u64>,
    pub last_modified: Option<Timestamp>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
}

/// Body and metadata of a fetched object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOutput {
    pub body: Vec<u8>,
    pub meta: ObjectMeta,
}

/// Outcome of a successful upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOutput {
    pub etag: Option<String>,
}

/// One object returned by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<Timestamp>,
    pub etag: Option<String>,
}

impl ObjectSummary {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
            etag: None,
        }
    }
}

/// Complete result of a prefix listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Objects under the prefix (immediate children only when a delimiter was given)
    pub objects: Vec<ObjectSummary>,

    /// Grouped key prefixes, each ending in the delimiter
    pub common_prefixes: Vec<String>,
}

/// The object storage operations the adapter is built on
///
/// Implementations own authentication, transport, retries and timeouts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Fetch an object's body and metadata
    async fn get(&self, key: &str) -> BackendResult<GetOutput>;

    /// Store `body` under `key`, replacing any existing object
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> BackendResult<PutOutput>;

    /// Delete an object
    async fn delete(&self, key: &str) -> BackendResult<()>;

    /// Fetch an object's metadata
    async fn head(&self, key: &str) -> BackendResult<ObjectMeta>;

    /// List every key starting with `prefix`
    ///
    /// With a delimiter, keys containing it after the prefix are folded into
    /// `common_prefixes`. Implementations return the full listing, following
    /// pagination internally.
    async fn list(&self, prefix: &str, delimiter: Option<char>) -> BackendResult<Listing>;
}

#[async_trait]
impl<T: ObjectBackend + ?Sized> ObjectBackend for Arc<T> {
    async fn get(&self, key: &str) -> BackendResult<GetOutput> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> BackendResult<PutOutput> {
        (**self).put(key, body, content_type).await
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        (**self).delete(key).await
    }

    async fn head(&self, key: &str) -> BackendResult<ObjectMeta> {
        (**self).head(key).await
    }

    async fn list(&self, prefix: &str, delimiter: Option<char>) -> BackendResult<Listing> {
        (**self).list(prefix, delimiter).await
    }
}

/// POSIX-like mode reported for every object: regular file, rw-r--r--
pub const FILE_MODE: u32 = 0o100644;

/// Stats synthesized for a stored object
///
/// Objects are always plain files here: virtual directories exist only in
/// listings and are never stat-able.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    /// Size in bytes
    pub size: u64,

    /// Last modification time
    pub modified: Timestamp,

    /// POSIX-style mode bits
    pub mode: u32,
}

impl FileStats {
    pub fn new(size: u64, modified: Timestamp) -> Self {
        Self {
            size,
            modified,
            mode: FILE_MODE,
        }
    }

    pub fn is_file(&self) -> bool {
        true
    }

    pub fn is_directory(&self) -> bool {
        false
    }

    pub fn is_symbolic_link(&self) -> bool {
        false
    }

    /// Human-readable size in binary units
    pub fn size_human(&self) -> String {
        humansize::format_size(self.size, humansize::BINARY)
    }
}

/// Read-only description of where an adapter stores its data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub bucket: String,
    pub region: String,
    pub prefix: String,
}

/// Filesystem-style access to stored blobs
///
/// Paths are filesystem-like strings; implementations map them to keys.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Check whether a file exists at `path`
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Read a file's raw bytes
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Read a file as text
    async fn read_file(&self, path: &str) -> Result<String>;

    /// Write a file, replacing any previous content
    ///
    /// `None` is rejected as an invalid argument; an empty slice writes an
    /// empty file.
    async fn write_file(&self, path: &str, data: Option<&[u8]>) -> Result<()>;

    /// Delete a file; deleting a missing file succeeds
    async fn delete_file(&self, path: &str) -> Result<()>;

    /// Names of the immediate children of a directory
    ///
    /// Subdirectory names keep their trailing slash.
    async fn read_dir(&self, path: &str) -> Result<Vec<String>>;

    /// Make sure a directory exists
    async fn ensure_dir(&self, path: &str) -> Result<()>;

    /// Delete a directory and everything beneath it
    async fn delete_dir(&self, path: &str) -> Result<()>;

    /// Change permissions of a file
    async fn chmod(&self, path: &str, mode: u32) -> Result<()>;

    /// Size, modification time and type of a file
    async fn stat(&self, path: &str) -> Result<FileStats>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stats_predicates() {
        let stats = FileStats::new(1536, Timestamp::UNIX_EPOCH);
        assert!(stats.is_file());
        assert!(!stats.is_directory());
        assert!(!stats.is_symbolic_link());
        assert_eq!(stats.mode, 0o100644);
        let human = stats.size_human();
        assert!(human.starts_with("1.5"), "{human}");
        assert!(human.ends_with("KiB"), "{human}");
    }

    #[test]
    fn test_backend_error() {
        let err = BackendError::not_found("NoSuchKey: the key does not exist");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "NoSuchKey: the key does not exist");

        let err = BackendError::new(BackendErrorKind::Timeout, "timed out");
        assert!(!err.is_not_found());
        assert_eq!(BackendError::other("x").kind, BackendErrorKind::Other);
    }
}
