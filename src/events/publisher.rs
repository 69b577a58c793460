//! Broadcast-backed publisher for pipeline lifecycle events.
//!
//! Transitions, batch runs, and dedup resolutions announce themselves here
//! so external observers (UIs, notifiers, audit sinks) can subscribe without
//! the core knowing about them. Publishing is fire-and-forget: zero
//! subscribers is a normal condition, and a lagging subscriber only loses
//! its own backlog, never blocks the pipeline.

use serde_json::Value;
use tokio::sync::broadcast;

use crate::constants::system::DEFAULT_EVENT_CHANNEL_CAPACITY;

/// A lifecycle event as delivered to subscribers
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    /// Name from [`crate::constants::events`]
    pub name: String,
    /// Event-specific payload
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

/// Errors from event publication
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event channel is closed")]
    ChannelClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Cloneable handle to the lifecycle event channel
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

impl EventPublisher {
    /// Publisher with the given channel capacity.
    ///
    /// Capacity bounds how far a slow subscriber may lag before it starts
    /// missing events; it never applies back-pressure to publishers.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a named event with its context payload
    pub async fn publish(
        &self,
        event_name: impl Into<String>,
        context: Value,
    ) -> Result<(), PublishError> {
        let event = PublishedEvent {
            name: event_name.into(),
            context,
            published_at: chrono::Utc::now(),
        };

        // broadcast::send errors only when no receiver exists, which is an
        // acceptable state here: events are informational, not load-bearing.
        let _ = self.sender.send(event);
        Ok(())
    }

    /// Subscribe to all events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}
