//! bfs-core: Core library for bucketfs
//!
//! This crate lets code written against a filesystem-style interface run
//! against object storage. It provides:
//! - Path to storage key normalization with namespace prefixes
//! - A per-adapter metadata/content cache
//! - The `ObjectBackend` trait the adapter is built on
//! - The `FileSystem` trait and its `ObjectFs` implementation
//! - Configuration loading
//!
//! This crate is independent of any specific S3 SDK; see `bfs-s3` for the
//! AWS implementation and [`memory::MemoryBackend`] for an in-process one.

pub mod cache;
pub mod config;
pub mod content_type;
pub mod error;
pub mod fs;
pub mod memory;
pub mod path;
pub mod traits;

pub use cache::{CacheEntry, ObjectCache};
pub use config::{AdapterConfig, Config, ConfigManager, RetryConfig, TimeoutConfig};
pub use error::{Error, Result};
pub use fs::ObjectFs;
pub use path::{KeyMapper, normalize_path};
pub use traits::{
    BackendError, BackendErrorKind, BackendResult, BucketInfo, FileStats, FileSystem, GetOutput,
    Listing, ObjectBackend, ObjectMeta, ObjectSummary, PutOutput,
};
