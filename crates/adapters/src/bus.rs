//! InMemoryBus adapter using tokio::broadcast
//!
//! Concrete implementation of the EventPublisher and EventSubscriber ports.

use async_trait::async_trait;
use ibai_ports::event_bus::{
    EventBusError, EventPublisher, EventReceiver, EventSubscriber, SystemEvent,
};
use tokio::sync::broadcast;

/// In-memory event bus for inter-module communication
pub struct InMemoryBus {
    sender: broadcast::Sender<SystemEvent>,
    capacity: usize,
}

impl InMemoryBus {
    /// Create a new InMemoryBus with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Get the configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get number of receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventPublisher for InMemoryBus {
    async fn publish(&self, event: SystemEvent) -> Result<(), EventBusError> {
        // A send only fails when no receiver is subscribed; events are
        // observability, so that is not an error for the publisher.
        let _ = self.sender.send(event);
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for InMemoryBus {
    async fn subscribe(&self) -> Result<EventReceiver, EventBusError> {
        let receiver = self.sender.subscribe();
        Ok(EventReceiver { receiver })
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibai_core::{RunId, RunStatus};

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = InMemoryBus::new(16);
        let mut receiver = bus.subscribe().await.unwrap();

        let run_id = RunId::new();
        bus.publish(SystemEvent::RunCompleted {
            run_id,
            status: RunStatus::Succeeded,
        })
        .await
        .unwrap();

        match receiver.recv().await.unwrap() {
            SystemEvent::RunCompleted { run_id: got, status } => {
                assert_eq!(got, run_id);
                assert_eq!(status, RunStatus::Succeeded);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = InMemoryBus::new(4);
        assert!(bus
            .publish(SystemEvent::CacheStored {
                key: "k".to_string()
            })
            .await
            .is_ok());
    }
}
