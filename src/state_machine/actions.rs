//! # Transition Actions
//!
//! Side effects dispatched after a transition commits: structured logging,
//! lifecycle event publication, and the operator-attention alert on
//! exhaustion. Actions run after persistence, never before, and their
//! failures are swallowed: a logging or publication problem must not fail
//! an already committed transition.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::constants::events;
use crate::events::publisher::{EventPublisher, PublishError};
use crate::models::TrackedItem;
use crate::state_machine::states::ProcessingStatus;

/// Errors raised by individual transition actions
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Failed to publish event '{event}': {source}")]
    EventPublish {
        event: String,
        #[source]
        source: PublishError,
    },
}

/// A side effect to run after a committed transition
#[async_trait]
pub trait TransitionAction: Send + Sync {
    async fn execute(
        &self,
        item: &TrackedItem,
        from: ProcessingStatus,
        to: ProcessingStatus,
    ) -> Result<(), ActionError>;

    /// Human-readable description for failure logs
    fn description(&self) -> &'static str;
}

/// Event context shared by transition-driven publications
pub fn build_transition_context(
    item: &TrackedItem,
    from: ProcessingStatus,
    to: ProcessingStatus,
) -> Value {
    json!({
        "item_id": item.item_id,
        "url": item.url,
        "from": from,
        "to": to,
        "attempts": item.attempts,
        "external_key": item.external_key,
    })
}

/// Structured log line for every committed transition
pub struct LogTransitionAction;

#[async_trait]
impl TransitionAction for LogTransitionAction {
    async fn execute(
        &self,
        item: &TrackedItem,
        from: ProcessingStatus,
        to: ProcessingStatus,
    ) -> Result<(), ActionError> {
        info!(
            item_id = %item.item_id,
            url = %item.url,
            from = %from,
            to = %to,
            "Status transition committed"
        );
        Ok(())
    }

    fn description(&self) -> &'static str {
        "log committed transition"
    }
}

/// Publish the generic transition lifecycle event
pub struct PublishTransitionEventAction {
    publisher: EventPublisher,
}

impl PublishTransitionEventAction {
    pub fn new(publisher: EventPublisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl TransitionAction for PublishTransitionEventAction {
    async fn execute(
        &self,
        item: &TrackedItem,
        from: ProcessingStatus,
        to: ProcessingStatus,
    ) -> Result<(), ActionError> {
        self.publisher
            .publish(
                events::ITEM_TRANSITIONED,
                build_transition_context(item, from, to),
            )
            .await
            .map_err(|source| ActionError::EventPublish {
                event: events::ITEM_TRANSITIONED.to_string(),
                source,
            })
    }

    fn description(&self) -> &'static str {
        "publish transition event"
    }
}

/// Flag items that ran out of automatic processing paths.
///
/// Exhaustion requires an operator decision, so it gets a warning log and
/// a dedicated event on top of the generic transition event.
pub struct AlertOnExhaustionAction {
    publisher: EventPublisher,
}

impl AlertOnExhaustionAction {
    pub fn new(publisher: EventPublisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl TransitionAction for AlertOnExhaustionAction {
    async fn execute(
        &self,
        item: &TrackedItem,
        _from: ProcessingStatus,
        to: ProcessingStatus,
    ) -> Result<(), ActionError> {
        if to != ProcessingStatus::Exhausted {
            return Ok(());
        }

        warn!(
            item_id = %item.item_id,
            url = %item.url,
            attempts = item.attempts,
            "Item exhausted all automatic processing paths, operator attention needed"
        );
        self.publisher
            .publish(
                events::ITEM_EXHAUSTED,
                json!({
                    "item_id": item.item_id,
                    "url": item.url,
                    "attempts": item.attempts,
                }),
            )
            .await
            .map_err(|source| ActionError::EventPublish {
                event: events::ITEM_EXHAUSTED.to_string(),
                source,
            })
    }

    fn description(&self) -> &'static str {
        "alert on exhaustion"
    }
}

/// Ordered set of actions dispatched after every committed transition
pub struct TransitionHooks {
    actions: Vec<Box<dyn TransitionAction>>,
}

impl TransitionHooks {
    /// The standard hook set: log, publish, alert on exhaustion
    pub fn standard(publisher: EventPublisher) -> Self {
        Self {
            actions: vec![
                Box::new(LogTransitionAction),
                Box::new(PublishTransitionEventAction::new(publisher.clone())),
                Box::new(AlertOnExhaustionAction::new(publisher)),
            ],
        }
    }

    /// Hooks with custom actions, for callers adding their own side effects
    pub fn with_actions(actions: Vec<Box<dyn TransitionAction>>) -> Self {
        Self { actions }
    }

    /// Run every action, swallowing individual failures
    pub async fn run(&self, item: &TrackedItem, from: ProcessingStatus, to: ProcessingStatus) {
        for action in &self.actions {
            if let Err(error) = action.execute(item, from, to).await {
                warn!(
                    item_id = %item.item_id,
                    action = action.description(),
                    error = %error,
                    "Transition side-effect failed, continuing"
                );
            }
        }
    }
}
