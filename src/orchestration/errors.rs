use uuid::Uuid;

use crate::state_machine::errors::StateMachineError;
use crate::state_machine::states::PipelineStage;
use crate::store::StoreError;

/// Errors from the item processor and batch executor
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("No stage executor registered for stage '{stage}'")]
    StageExecutorMissing { stage: PipelineStage },

    #[error("Batch {batch_id} not found; it may have finished already")]
    BatchNotFound { batch_id: Uuid },

    #[error("Batch {batch_id} task failed to join: {reason}")]
    BatchJoin { batch_id: Uuid, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    StateMachine(#[from] StateMachineError),
}

pub type OrchestrationResult<T> = Result<T, OrchestrationError>;
