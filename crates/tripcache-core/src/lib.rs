//! Offline-first resilience layer for tripcache.
//!
//! - `store`: namespaced persistent key-value store with shallow merge
//! - `cache`: named response caches (memory and disk)
//! - `controller`: cache-first request mediation and worker lifecycle
//! - `tiles`: map tile pre-fetch and trip package records
//! - `sync`: reconnect notifier broadcasting to open clients
//!
//! Network, cache storage and time are injected through the `Fetcher`,
//! `CacheStorage` and `Clock` traits.

pub mod cache;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod http;
pub mod store;
pub mod sync;
pub mod tiles;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheNames, CacheStorage, DiskCacheStorage, MemoryCacheStorage};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use controller::{
    ClientMessage, ClientRegistry, ControllerOptions, NetworkCacheController, OutboundMessage,
    WorkerEvent, WorkerState,
};
pub use error::OfflineError;
pub use fetch::{Fetcher, HttpFetcher};
pub use http::{Request, Response, ResponseType};
pub use store::{FileBackend, LocalStore, MemoryBackend, StoreBackend};
pub use sync::ReconnectNotifier;
pub use tiles::{MapBounds, TileCacheManager, TileProgress, TileUrlTemplate, TripPackage};
