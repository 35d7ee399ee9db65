//! Event Bus Module
//!
//! The turn loop reports what it is doing through an [`EventBus`]; UIs and
//! loggers subscribe to it. Publishing is fire-and-forget: it never blocks
//! the loop and never fails, with or without subscribers.
//!
//! Each subscriber has a bounded buffer of `capacity` events. A subscriber
//! that falls behind loses its oldest events; [`EventStream::recv`] logs
//! the gap and resumes from the oldest event still buffered.
//!
//! # Example
//!
//! ```
//! use mcphost::bus::{AgentEvent, EventBus};
//!
//! #[tokio::main]
//! async fn main() {
//!     let bus = EventBus::new(16);
//!     let mut events = bus.subscribe();
//!
//!     bus.publish(AgentEvent::Thinking { session_id: "s1".into() });
//!
//!     let event = events.recv().await.unwrap();
//!     assert_eq!(event.session_id(), "s1");
//! }
//! ```

mod events;

pub use events::AgentEvent;

use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Default per-subscriber buffer
const DEFAULT_CAPACITY: usize = 256;

/// Broadcast channel for [`AgentEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    /// Create a bus retaining up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Returns how many subscribers will see it.
    pub fn publish(&self, event: AgentEvent) -> usize {
        trace!(kind = event.kind(), session_id = %event.session_id(), "Publishing event");
        // Err only means nobody is subscribed.
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// One subscriber's view of the bus.
pub struct EventStream {
    receiver: broadcast::Receiver<AgentEvent>,
}

impl EventStream {
    /// Next event, or `None` once every bus handle is dropped.
    pub async fn recv(&mut self) -> Option<AgentEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscriber lagged; oldest events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<AgentEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscriber lagged; oldest events dropped");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thinking(n: usize) -> AgentEvent {
        AgentEvent::Thinking {
            session_id: format!("s{}", n),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(thinking(0)), 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish(thinking(1)), 2);
        assert_eq!(a.recv().await, Some(thinking(1)));
        assert_eq!(b.recv().await, Some(thinking(1)));
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_oldest() {
        let bus = EventBus::new(2);
        let mut slow = bus.subscribe();
        for n in 0..5 {
            bus.publish(thinking(n));
        }

        assert_eq!(slow.recv().await, Some(thinking(3)));
        assert_eq!(slow.recv().await, Some(thinking(4)));
        assert!(slow.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_stream_ends_when_bus_dropped() {
        let bus = EventBus::new(2);
        let mut stream = bus.subscribe();
        bus.publish(thinking(7));
        drop(bus);

        assert_eq!(stream.recv().await, Some(thinking(7)));
        assert_eq!(stream.recv().await, None);
    }
}
