//! Wire messages exchanged between the controller and client instances.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action carried by the reconnect broadcast.
pub const SYNC_QUEUE_ACTION: &str = "sync-queue";

/// Messages clients post to the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Activate a waiting worker without waiting for older instances.
    SkipWaiting,
    /// Store an arbitrary payload as a cached JSON response for a group.
    CacheTripPackage { payload: TripPackagePayload },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct TripPackagePayload {
    pub group_id: String,
    pub data: Value,
}

/// Messages the controller posts to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    BackgroundSync { action: String },
}

impl OutboundMessage {
    pub fn sync_queue() -> Self {
        OutboundMessage::BackgroundSync {
            action: SYNC_QUEUE_ACTION.to_string(),
        }
    }
}
