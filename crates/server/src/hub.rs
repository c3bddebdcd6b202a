// crates/server/src/hub.rs
//! Fan-out hub for server events.
//!
//! Two broadcast channels with different capacities: the broadcast path
//! carries low-rate lifecycle events every viewer wants, the message path
//! carries the high-rate per-session `session:new_message` stream that each
//! viewer filters against its subscriptions. Splitting them means a burst of
//! messages from one busy session cannot lag lifecycle delivery.

use tokio::sync::broadcast;

use agentdeck_types::ServerEvent;

const BROADCAST_CAPACITY: usize = 256;
const MESSAGE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct EventHub {
    broadcast_tx: broadcast::Sender<ServerEvent>,
    message_tx: broadcast::Sender<ServerEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (message_tx, _) = broadcast::channel(MESSAGE_CAPACITY);
        Self {
            broadcast_tx,
            message_tx,
        }
    }

    /// Publish one event onto the channel its kind belongs to. Send errors
    /// mean no receiver is currently connected, which is fine.
    pub fn publish(&self, event: ServerEvent) {
        match &event {
            ServerEvent::NewMessage { .. } => {
                let _ = self.message_tx.send(event);
            }
            _ => {
                let _ = self.broadcast_tx.send(event);
            }
        }
    }

    pub fn subscribe_broadcast(&self) -> broadcast::Receiver<ServerEvent> {
        self.broadcast_tx.subscribe()
    }

    pub fn subscribe_messages(&self) -> broadcast::Receiver<ServerEvent> {
        self.message_tx.subscribe()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
