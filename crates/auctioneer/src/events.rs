//! The engine's only outbound interface. Lifecycle and bid events are
//! published on a broadcast channel for external consumers (real-time
//! transport, email triggers) without the engine knowing who listens.
//! Delivery is at-most-once and best-effort; the persisted rows stay
//! the source of truth.

use model::events::AuctionEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<AuctionEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to all events. Consumers that only care about one
    /// auction filter on [`AuctionEvent::auction_id`] themselves.
    pub fn subscribe(&self) -> broadcast::Receiver<AuctionEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Having no subscribers is not an error; slow
    /// subscribers miss events rather than blocking the engine.
    pub fn emit(&self, event: AuctionEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("no event subscribers");
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(1024)
    }
}
