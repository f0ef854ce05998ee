//! Reconnect notifier.
//!
//! When the platform reports that connectivity is back for our sync tag,
//! every open client is told to replay its queued mutations. The notifier
//! holds no state of its own, so duplicate firings just re-broadcast.
//! Replay, ordering and conflict handling belong to the clients.

use tracing::{debug, info};

use crate::controller::{ClientRegistry, OutboundMessage};
use crate::error::{OfflineError, Result};

/// Tag the application registers its deferred mutation queue under.
pub const DEFAULT_SYNC_TAG: &str = "sync-queue";

#[derive(Clone)]
pub struct ReconnectNotifier {
    clients: ClientRegistry,
    tag: Option<String>,
}

impl ReconnectNotifier {
    pub fn new(clients: ClientRegistry, tag: impl Into<String>) -> Self {
        Self {
            clients,
            tag: Some(tag.into()),
        }
    }

    /// Notifier for a platform with no connectivity-restored signal.
    pub fn unsupported(clients: ClientRegistry) -> Self {
        Self { clients, tag: None }
    }

    pub fn is_supported(&self) -> bool {
        self.tag.is_some()
    }

    /// Same notifier, posting to a different set of clients.
    pub fn with_clients(&self, clients: ClientRegistry) -> Self {
        Self {
            clients,
            tag: self.tag.clone(),
        }
    }

    /// Handle a connectivity-restored signal. Returns how many clients were
    /// messaged; signals for other tags are ignored.
    pub async fn notify(&self, tag: &str) -> Result<usize> {
        let Some(ours) = self.tag.as_deref() else {
            return Err(OfflineError::SyncUnsupported);
        };
        if tag != ours {
            debug!(tag, expected = ours, "Ignoring sync signal for foreign tag");
            return Ok(0);
        }

        let notified = self.clients.broadcast(OutboundMessage::sync_queue());
        info!(tag, notified, "Connectivity restored, clients notified");
        Ok(notified)
    }
}
