//! History event streaming.
//!
//! Every committed apply, undo or redo is published on a global broadcast
//! channel so front ends can follow project state without polling.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::operations::ColumnsDiff;

/// What happened to the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Applied,
    Undone,
    Redone,
}

/// A single history transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    pub project_id: Uuid,
    pub entry_id: Uuid,
    pub action: HistoryAction,
    /// Description of the operation behind the entry
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns_diff: Option<ColumnsDiff>,
    /// Row count of the grid after the transition
    pub row_count: usize,
}

/// Global event broadcaster
pub static EVENT_BROADCASTER: Lazy<EventBroadcaster> = Lazy::new(EventBroadcaster::new);

/// Broadcasts history events to all subscribers
pub struct EventBroadcaster {
    sender: broadcast::Sender<HistoryEvent>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send an event to all subscribers
    pub fn publish(&self, event: HistoryEvent) {
        tracing::info!(
            project = %event.project_id,
            entry = %event.entry_id,
            action = ?event.action,
            rows = event.row_count,
            "{}",
            event.description
        );

        // No receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.sender.subscribe()
    }
}

/// Publish on the global broadcaster
pub fn publish(event: HistoryEvent) {
    EVENT_BROADCASTER.publish(event);
}

pub fn subscribe() -> broadcast::Receiver<HistoryEvent> {
    EVENT_BROADCASTER.subscribe()
}
