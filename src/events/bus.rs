use super::types::{Component, EventSequence, NotificationLevel, StateEvent, StatePayload};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

pub type EventReceiver = broadcast::Receiver<StateEvent>;
pub type EventSender = broadcast::Sender<StateEvent>;

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Event bus for distributing state changes to consumers
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: EventSender,
    sequence: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Publish an event (returns sequence number)
    ///
    /// Fails only when nobody is subscribed, which callers treat as a no-op.
    pub fn publish(
        &self,
        component: Component,
        payload: StatePayload,
    ) -> Result<EventSequence, String> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);

        let event = StateEvent {
            sequence,
            timestamp: Utc::now(),
            component,
            payload,
        };

        self.sender
            .send(event)
            .map(|_| sequence)
            .map_err(|e| format!("Failed to publish event: {}", e))
    }

    pub fn notify(
        &self,
        component: Component,
        level: NotificationLevel,
        title: &str,
        description: Option<String>,
    ) {
        let _ = self.publish(
            component,
            StatePayload::Notification {
                level,
                title: title.to_string(),
                description,
            },
        );
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Get current sequence number
    pub fn current_sequence(&self) -> EventSequence {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Get number of active receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
