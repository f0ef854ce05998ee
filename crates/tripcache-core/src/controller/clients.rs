//! Open client connections.
//!
//! Clients talk to the controller only by message passing. Each connected
//! client owns the receiving half of a bounded channel; the registry keeps
//! the sending halves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, warn};

use super::messages::OutboundMessage;

/// Buffer size for each client's message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

pub type ClientId = u64;

struct ClientSlot {
    id: ClientId,
    controlled: bool,
    tx: mpsc::Sender<OutboundMessage>,
}

/// The receiving side handed to a connected client.
pub struct ClientHandle {
    pub id: ClientId,
    pub rx: mpsc::Receiver<OutboundMessage>,
}

/// Cheap-to-clone handle over the set of open clients.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    slots: Arc<Mutex<Vec<ClientSlot>>>,
    next_id: Arc<AtomicU64>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ClientSlot>> {
        // A poisoned registry still holds valid senders.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new client connection.
    pub fn connect(&self) -> ClientHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        self.lock().push(ClientSlot {
            id,
            controlled: false,
            tx,
        });
        debug!(client = id, "Client connected");
        ClientHandle { id, rx }
    }

    /// Number of clients whose receivers are still open.
    pub fn len(&self) -> usize {
        self.lock().iter().filter(|s| !s.tx.is_closed()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take control of every open client. Returns how many were claimed.
    pub fn claim(&self) -> usize {
        let mut slots = self.lock();
        slots.retain(|s| !s.tx.is_closed());
        for slot in slots.iter_mut() {
            slot.controlled = true;
        }
        slots.len()
    }

    pub fn is_controlled(&self, id: ClientId) -> bool {
        self.lock()
            .iter()
            .any(|s| s.id == id && s.controlled && !s.tx.is_closed())
    }

    /// Post `message` to every open client without waiting, dropping clients
    /// that have gone away. A client whose channel is full misses this
    /// message but stays registered. Returns the number of clients that
    /// received it.
    pub fn broadcast(&self, message: OutboundMessage) -> usize {
        let mut slots = self.lock();
        let mut delivered = 0;
        slots.retain(|slot| match slot.tx.try_send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(client = slot.id, "Client not reading messages, dropping one");
                true
            }
            Err(TrySendError::Closed(_)) => {
                error!(client = slot.id, "Failed to post message - client closed");
                false
            }
        });
        delivered
    }
}
