//! Named response caches.
//!
//! A `CacheStorage` holds any number of named caches, each mapping request
//! URLs to stored responses. Eviction is whole-cache: the controller deletes
//! cache generations whose names are no longer current.
//!
//! Two implementations are provided:
//! - `MemoryCacheStorage`: process-local, used in tests and short sessions
//! - `DiskCacheStorage`: one directory per cache under a root directory

pub mod disk;
pub mod memory;
pub mod storage;

pub use disk::DiskCacheStorage;
pub use memory::MemoryCacheStorage;
pub use storage::{CacheNames, CacheStorage};
