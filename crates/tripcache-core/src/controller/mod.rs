//! Network cache controller.
//!
//! Mediates every request the client makes: cache-first for GETs, with
//! same-origin 200 responses stored on the way back and a cached offline
//! page when the network is unreachable. The controller also owns the
//! worker lifecycle (install the app shell, sweep stale cache generations
//! on activation) and the client message protocol.

pub mod clients;
pub mod messages;
pub mod worker;

pub use clients::{ClientHandle, ClientId, ClientRegistry};
pub use messages::{ClientMessage, OutboundMessage, TripPackagePayload, SYNC_QUEUE_ACTION};
pub use worker::{
    ControllerOptions, EventOutcome, FetchOutcome, NetworkCacheController, ResponseSource,
    WorkerEvent, WorkerState, DEFAULT_OFFLINE_PAGE, DEFAULT_TRIP_PACKAGE_PREFIX,
};
