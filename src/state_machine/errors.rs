use uuid::Uuid;

use crate::state_machine::guards::ItemAction;
use crate::state_machine::integrity::IntegrityIssue;
use crate::state_machine::states::ProcessingStatus;
use crate::store::StoreError;

/// Errors from transition validation and commit
#[derive(Debug, thiserror::Error)]
pub enum StateMachineError {
    #[error("Invalid transition from '{from}' to '{to}'")]
    InvalidTransition {
        from: ProcessingStatus,
        to: ProcessingStatus,
    },

    #[error("Transition to '{to}' requires an external record key")]
    ExternalKeyRequired { to: ProcessingStatus },

    #[error("No repair applies to item {item_id}: no integrity issues detected")]
    NothingToRepair { item_id: Uuid },

    #[error("Repair left item {item_id} with unresolved integrity issues: {remaining}")]
    RepairIncomplete { item_id: Uuid, remaining: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

/// Errors from guard evaluation
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("Action '{action}' is not allowed for item {item_id}: {reason}")]
    NotAllowed {
        action: ItemAction,
        item_id: Uuid,
        reason: String,
    },

    #[error(
        "Action '{action}' is blocked for item {item_id} by integrity violation {code}: {detail}"
    )]
    IntegrityBlocked {
        action: ItemAction,
        item_id: Uuid,
        code: &'static str,
        detail: String,
    },
}

impl GuardError {
    pub fn not_allowed(action: ItemAction, item_id: Uuid, reason: impl Into<String>) -> Self {
        Self::NotAllowed {
            action,
            item_id,
            reason: reason.into(),
        }
    }

    pub fn integrity_blocked(action: ItemAction, item_id: Uuid, issue: &IntegrityIssue) -> Self {
        Self::IntegrityBlocked {
            action,
            item_id,
            code: issue.code(),
            detail: issue.to_string(),
        }
    }
}

pub type GuardResult<T> = Result<T, GuardError>;
