use tokio::sync::broadcast;

use crate::dto::push::ServerEvent;

/// Broadcast hub feeding every connected client.
///
/// WebSocket sessions and SSE observers all subscribe here; a mutation
/// publishes one serialized event and each subscriber forwards it over
/// its own transport.
pub struct Hub {
    sender: broadcast::Sender<ServerEvent>,
}

impl Hub {
    /// Construct a hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers right now.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
