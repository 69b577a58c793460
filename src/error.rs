//! Crate-level error type aggregating every module's failures

use crate::config::ConfigurationError;
use crate::dedup::DedupError;
use crate::events::PublishError;
use crate::orchestration::OrchestrationError;
use crate::state_machine::errors::{GuardError, StateMachineError};
use crate::store::StoreError;

/// Any failure the pipeline core can produce
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    StateMachine(#[from] StateMachineError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    #[error(transparent)]
    Dedup(#[from] DedupError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
