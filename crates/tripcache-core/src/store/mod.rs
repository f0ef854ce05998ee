//! Local persistent store.
//!
//! `LocalStore` is a namespaced key-value store of JSON values with
//! shallow-merge support. It sits on a `StoreBackend`, either the
//! in-memory backend or the file backend that keeps one JSON document per
//! namespace on disk.

pub mod backend;
pub mod local;

pub use backend::{FileBackend, MemoryBackend, StoreBackend};
pub use local::LocalStore;
