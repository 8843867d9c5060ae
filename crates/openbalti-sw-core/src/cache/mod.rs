//! Namespaced response cache.
//!
//! A cache storage holds named caches ("namespaces"), each mapping a request
//! URL to the last successful response for it. The worker owns one namespace
//! per `CacheRole` and per version; older namespaces are dropped whole on
//! activation rather than expired entry by entry.
//!
//! Backends:
//! - `MemoryCacheStorage`: in-process, used by tests and short-lived hosts
//! - `DiskCacheStorage`: JSON index plus body files under a cache directory

pub mod disk;
pub mod entry;
pub mod memory;
pub mod report;
pub mod storage;

pub use disk::DiskCacheStorage;
pub use entry::CachedEntry;
pub use memory::MemoryCacheStorage;
pub use report::{CacheReport, NamespaceReport};
pub use storage::CacheStorage;
