//! Chain event subscription handle.

use tokio::sync::broadcast;

use wisp_core::types::Header;

/// Default buffered events per subscriber.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Event published to backend subscribers.
#[derive(Debug, Clone)]
pub enum ChainEvent {
    /// A new committed head was adopted.
    NewHead(Header),
}

/// Broadcast hub for chain events.
///
/// Subscribers that fall behind lose the oldest events (broadcast
/// semantics); this is announcement plumbing, not a durable queue.
pub struct EventMux {
    sender: broadcast::Sender<ChainEvent>,
}

impl Default for EventMux {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventMux {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Returns the number of subscribers reached.
    pub fn publish(&self, event: ChainEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Current number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
