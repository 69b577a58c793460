//! # Lifecycle Events
//!
//! Fire-and-forget event publication for pipeline observers. Event names
//! live in [`crate::constants::events`]; payloads are JSON values built at
//! the publication site.

pub mod publisher;

// Re-export key types for convenience
pub use publisher::{EventPublisher, PublishError, PublishedEvent};
