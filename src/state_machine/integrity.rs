//! # Integrity Rules
//!
//! Invariants that must hold for every tracked item at rest, plus the
//! deterministic repair proposals for each violation pattern. Violations
//! only arise from out-of-band data corruption; the transition table alone
//! never produces one. Detection is read-only; repairs are proposals that
//! an operator applies explicitly through
//! [`StatusMachine::apply_repair`](crate::state_machine::StatusMachine::apply_repair).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::TrackedItem;
use crate::state_machine::states::ProcessingStatus;

/// A violated integrity rule, in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityIssue {
    /// An external key is attached but the status is not a stored status
    LinkedButNotStored,
    /// A stored status carries no external key
    StoredWithoutItem,
    /// An ignored or archived item still holds an external key
    ArchivedWithItem,
    /// An active-processing item already holds an external key
    ProcessingWithItem,
}

impl IntegrityIssue {
    /// Stable code used in error messages and event payloads
    pub fn code(&self) -> &'static str {
        match self {
            Self::LinkedButNotStored => "LINKED_BUT_NOT_STORED",
            Self::StoredWithoutItem => "STORED_WITHOUT_ITEM",
            Self::ArchivedWithItem => "ARCHIVED_WITH_ITEM",
            Self::ProcessingWithItem => "PROCESSING_WITH_ITEM",
        }
    }
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            Self::LinkedButNotStored => {
                "external key present but status is not a stored status"
            }
            Self::StoredWithoutItem => "stored status without an external key",
            Self::ArchivedWithItem => "ignored or archived item still holds an external key",
            Self::ProcessingWithItem => "active-processing item already holds an external key",
        };
        write!(f, "{} ({description})", self.code())
    }
}

/// What a repair will do when applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairAction {
    /// Force-write the given status, keeping the external key
    ForceStatus(ProcessingStatus),
    /// Clear the external key, keeping the current status
    UnlinkKey,
}

/// Deterministic repair proposal for the most specific detected violation
#[derive(Debug, Clone)]
pub struct RepairProposal {
    pub issue: IntegrityIssue,
    pub action: RepairAction,
}

/// All violated rules for the item, in rule order
pub fn integrity_issues(item: &TrackedItem) -> Vec<IntegrityIssue> {
    let mut issues = Vec::new();

    if item.external_key.is_some() && !item.status.is_stored() {
        issues.push(IntegrityIssue::LinkedButNotStored);
    }
    if item.status.is_stored() && item.external_key.is_none() {
        issues.push(IntegrityIssue::StoredWithoutItem);
    }
    if matches!(
        item.status,
        ProcessingStatus::Ignored | ProcessingStatus::Archived
    ) && item.external_key.is_some()
    {
        issues.push(IntegrityIssue::ArchivedWithItem);
    }
    if item.status.is_active_processing() && item.external_key.is_some() {
        issues.push(IntegrityIssue::ProcessingWithItem);
    }

    issues
}

/// Check the item satisfies every rule
pub fn is_consistent(item: &TrackedItem) -> bool {
    integrity_issues(item).is_empty()
}

/// Map the detected violation pattern to one deterministic repair.
///
/// Patterns are matched most-specific first: an archived item holding a key
/// violates both the archived rule and the linked-but-not-stored rule, and
/// the right fix is to drop the key, not to resurrect the item as stored.
pub fn suggest_repair(item: &TrackedItem) -> Option<RepairProposal> {
    let issues = integrity_issues(item);
    if issues.is_empty() {
        return None;
    }

    if issues.contains(&IntegrityIssue::ArchivedWithItem) {
        return Some(RepairProposal {
            issue: IntegrityIssue::ArchivedWithItem,
            action: RepairAction::UnlinkKey,
        });
    }
    if issues.contains(&IntegrityIssue::LinkedButNotStored) {
        // Covers the processing-with-item pattern too: the key is real, so
        // the status is what gets corrected.
        return Some(RepairProposal {
            issue: IntegrityIssue::LinkedButNotStored,
            action: RepairAction::ForceStatus(ProcessingStatus::StoredCustom),
        });
    }
    if issues.contains(&IntegrityIssue::StoredWithoutItem) {
        return Some(RepairProposal {
            issue: IntegrityIssue::StoredWithoutItem,
            action: RepairAction::ForceStatus(ProcessingStatus::NotStarted),
        });
    }

    None
}
