//! # Transition Table
//!
//! The single authority on which status changes are legal. Every commit in
//! [`StatusMachine`](crate::state_machine::StatusMachine) validates against
//! this table first; only integrity repairs are allowed to bypass it.
//!
//! Noteworthy edges:
//! - `awaiting_selection` re-enters the pipeline through `processing_zotero`
//!   only, never `processing_content`.
//! - `exhausted` does not re-enter processing directly; a retry resets to
//!   `not_started` first.
//! - Stored statuses leave only through `not_started` (unlink) or by moving
//!   between completeness levels.

use crate::state_machine::states::ProcessingStatus;

/// Legal target statuses from the given status
pub fn possible_next_states(from: ProcessingStatus) -> &'static [ProcessingStatus] {
    use ProcessingStatus::*;

    match from {
        NotStarted => &[ProcessingZotero, ProcessingContent, Ignored, Archived, StoredCustom],
        ProcessingZotero => &[Stored, StoredIncomplete, ProcessingContent, Exhausted],
        ProcessingContent => &[AwaitingSelection, ProcessingLlm, Exhausted],
        ProcessingLlm => &[AwaitingMetadata, Exhausted],
        AwaitingSelection => &[ProcessingZotero, Ignored, StoredCustom],
        AwaitingMetadata => &[Stored, StoredIncomplete, ProcessingZotero, Ignored, StoredCustom],
        Stored => &[NotStarted, StoredIncomplete],
        StoredIncomplete => &[Stored, NotStarted],
        StoredCustom => &[NotStarted],
        Exhausted => &[NotStarted, StoredCustom, Ignored, Archived],
        Ignored => &[NotStarted, Archived],
        Archived => &[NotStarted],
    }
}

/// Check whether `from -> to` appears in the transition table
pub fn can_transition(from: ProcessingStatus, to: ProcessingStatus) -> bool {
    possible_next_states(from).contains(&to)
}

/// All twelve statuses, for exhaustive table walks
pub const ALL_STATUSES: [ProcessingStatus; 12] = [
    ProcessingStatus::NotStarted,
    ProcessingStatus::ProcessingZotero,
    ProcessingStatus::ProcessingContent,
    ProcessingStatus::ProcessingLlm,
    ProcessingStatus::AwaitingSelection,
    ProcessingStatus::AwaitingMetadata,
    ProcessingStatus::Stored,
    ProcessingStatus::StoredIncomplete,
    ProcessingStatus::StoredCustom,
    ProcessingStatus::Exhausted,
    ProcessingStatus::Ignored,
    ProcessingStatus::Archived,
];
