//! # State Guards
//!
//! Pure predicates over a [`TrackedItem`] snapshot. Guards never mutate
//! state and are cheap enough to evaluate before every user-facing action.
//! Each guard composes a user-intent check, a status-membership check, and,
//! where relevant, a zero-integrity-issues check.
//!
//! Callers that need a denial reason use [`evaluate`]; the `can_*` functions
//! are boolean shorthands over the same logic.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::TrackedItem;
use crate::state_machine::errors::{GuardError, GuardResult};
use crate::state_machine::integrity::integrity_issues;
use crate::state_machine::states::ProcessingStatus;
use crate::state_machine::transitions::can_transition;

/// Operator-facing actions gated by guards, in display priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAction {
    Process,
    Retry,
    Link,
    Unlink,
    DeleteExternalRecord,
    Unignore,
    Reset,
    Ignore,
    Archive,
}

/// Priority order used by [`available_actions`]
pub const ACTION_PRIORITY: [ItemAction; 9] = [
    ItemAction::Process,
    ItemAction::Retry,
    ItemAction::Link,
    ItemAction::Unlink,
    ItemAction::DeleteExternalRecord,
    ItemAction::Unignore,
    ItemAction::Reset,
    ItemAction::Ignore,
    ItemAction::Archive,
];

impl fmt::Display for ItemAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Process => "process",
            Self::Retry => "retry",
            Self::Link => "link",
            Self::Unlink => "unlink",
            Self::DeleteExternalRecord => "delete_external_record",
            Self::Unignore => "unignore",
            Self::Reset => "reset",
            Self::Ignore => "ignore",
            Self::Archive => "archive",
        };
        write!(f, "{name}")
    }
}

/// Full processing guard with a denial reason.
///
/// `respect_user_intent = false` waives only the intent clause; status,
/// integrity, and capability requirements always apply.
pub fn check_process(item: &TrackedItem, respect_user_intent: bool) -> GuardResult<()> {
    if respect_user_intent && item.user_intent.blocks_processing() {
        return Err(GuardError::not_allowed(
            ItemAction::Process,
            item.item_id,
            format!(
                "user intent '{}' excludes automatic processing",
                item.user_intent
            ),
        ));
    }
    if !matches!(
        item.status,
        ProcessingStatus::NotStarted | ProcessingStatus::AwaitingSelection
    ) {
        return Err(GuardError::not_allowed(
            ItemAction::Process,
            item.item_id,
            format!("status '{}' is not processable", item.status),
        ));
    }
    if let Some(issue) = integrity_issues(item).first() {
        return Err(GuardError::integrity_blocked(
            ItemAction::Process,
            item.item_id,
            issue,
        ));
    }
    if !item.capabilities.has_any() {
        return Err(GuardError::not_allowed(
            ItemAction::Process,
            item.item_id,
            "no feasible processing capability",
        ));
    }
    Ok(())
}

/// The item can enter the automatic pipeline
pub fn can_process(item: &TrackedItem) -> bool {
    check_process(item, true).is_ok()
}

/// An external record key can be attached by hand
pub fn can_link(item: &TrackedItem) -> bool {
    item.external_key.is_none()
        && integrity_issues(item).is_empty()
        && !item.status.is_active_processing()
}

/// The current link can be removed
pub fn can_unlink(item: &TrackedItem) -> bool {
    item.status.is_stored() && integrity_issues(item).is_empty()
}

/// The linked external record may be deleted outright.
///
/// Never true for records the pipeline did not create, records a human has
/// edited, or records other items still reference.
pub fn can_delete_external_record(item: &TrackedItem) -> bool {
    item.external_key.is_some()
        && item.created_by_core
        && !item.user_modified_externally
        && item.linked_count <= 1
}

/// The item can be returned to `not_started`
pub fn can_reset(item: &TrackedItem) -> bool {
    can_transition(item.status, ProcessingStatus::NotStarted)
}

/// The item can be marked ignored
pub fn can_ignore(item: &TrackedItem) -> bool {
    can_transition(item.status, ProcessingStatus::Ignored)
}

/// An ignored item can be returned to the active set
pub fn can_unignore(item: &TrackedItem) -> bool {
    item.status == ProcessingStatus::Ignored
}

/// The item can be archived
pub fn can_archive(item: &TrackedItem) -> bool {
    can_transition(item.status, ProcessingStatus::Archived)
}

/// A failed or previously attempted item can be run again
pub fn can_retry(item: &TrackedItem) -> bool {
    item.status == ProcessingStatus::Exhausted
        || (item.status == ProcessingStatus::NotStarted && item.attempts > 0)
}

/// Evaluate a single action with a denial reason on failure
pub fn evaluate(item: &TrackedItem, action: ItemAction) -> GuardResult<()> {
    match action {
        ItemAction::Process => check_process(item, true),
        ItemAction::Retry => {
            if can_retry(item) {
                Ok(())
            } else {
                Err(GuardError::not_allowed(
                    action,
                    item.item_id,
                    "item is not exhausted and has no prior attempts",
                ))
            }
        }
        ItemAction::Link => {
            if let Some(ref key) = item.external_key {
                return Err(GuardError::not_allowed(
                    action,
                    item.item_id,
                    format!("already linked to external record '{key}'"),
                ));
            }
            if let Some(issue) = integrity_issues(item).first() {
                return Err(GuardError::integrity_blocked(action, item.item_id, issue));
            }
            if item.status.is_active_processing() {
                return Err(GuardError::not_allowed(
                    action,
                    item.item_id,
                    "cannot link while a pipeline stage is running",
                ));
            }
            Ok(())
        }
        ItemAction::Unlink => {
            if !item.status.is_stored() {
                return Err(GuardError::not_allowed(
                    action,
                    item.item_id,
                    format!("status '{}' holds no link to remove", item.status),
                ));
            }
            if let Some(issue) = integrity_issues(item).first() {
                return Err(GuardError::integrity_blocked(action, item.item_id, issue));
            }
            Ok(())
        }
        ItemAction::DeleteExternalRecord => {
            if item.external_key.is_none() {
                return Err(GuardError::not_allowed(
                    action,
                    item.item_id,
                    "no external record is linked",
                ));
            }
            if !item.created_by_core {
                return Err(GuardError::not_allowed(
                    action,
                    item.item_id,
                    "external record was not created by this pipeline",
                ));
            }
            if item.user_modified_externally {
                return Err(GuardError::not_allowed(
                    action,
                    item.item_id,
                    "external record has been hand-edited",
                ));
            }
            if item.linked_count > 1 {
                return Err(GuardError::not_allowed(
                    action,
                    item.item_id,
                    format!("{} items still reference this record", item.linked_count),
                ));
            }
            Ok(())
        }
        ItemAction::Unignore => {
            if can_unignore(item) {
                Ok(())
            } else {
                Err(GuardError::not_allowed(
                    action,
                    item.item_id,
                    format!("status '{}' is not ignored", item.status),
                ))
            }
        }
        ItemAction::Reset => {
            if can_reset(item) {
                Ok(())
            } else {
                Err(GuardError::not_allowed(
                    action,
                    item.item_id,
                    format!("status '{}' cannot be reset", item.status),
                ))
            }
        }
        ItemAction::Ignore => {
            if can_ignore(item) {
                Ok(())
            } else {
                Err(GuardError::not_allowed(
                    action,
                    item.item_id,
                    format!("status '{}' cannot be ignored", item.status),
                ))
            }
        }
        ItemAction::Archive => {
            if can_archive(item) {
                Ok(())
            } else {
                Err(GuardError::not_allowed(
                    action,
                    item.item_id,
                    format!("status '{}' cannot be archived", item.status),
                ))
            }
        }
    }
}

/// Every action the item currently permits, ordered by priority.
///
/// Drives operator surfaces and tells callers what they may legally
/// attempt next.
pub fn available_actions(item: &TrackedItem) -> Vec<ItemAction> {
    ACTION_PRIORITY
        .iter()
        .copied()
        .filter(|action| evaluate(item, *action).is_ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CapabilitySnapshot, UserIntent};

    fn item() -> TrackedItem {
        TrackedItem::new("https://example.com/paper")
    }

    fn stored_item(key: &str) -> TrackedItem {
        let mut item = item();
        item.status = ProcessingStatus::Stored;
        item.external_key = Some(key.to_string());
        item.created_by_core = true;
        item.linked_count = 1;
        item
    }

    #[test]
    fn test_can_process_fresh_item() {
        assert!(can_process(&item()));
    }

    #[test]
    fn test_intent_blocks_process() {
        for intent in [UserIntent::Ignore, UserIntent::Archive, UserIntent::ManualOnly] {
            let mut blocked = item();
            blocked.user_intent = intent;
            assert!(!can_process(&blocked), "{intent} should block processing");
            // Waiving intent lets the batch force-run the item
            assert!(check_process(&blocked, false).is_ok());
        }
    }

    #[test]
    fn test_process_requires_processable_status() {
        let mut awaiting = item();
        awaiting.status = ProcessingStatus::AwaitingSelection;
        assert!(can_process(&awaiting));

        for status in [
            ProcessingStatus::ProcessingZotero,
            ProcessingStatus::AwaitingMetadata,
            ProcessingStatus::Stored,
            ProcessingStatus::Exhausted,
        ] {
            let mut not_processable = item();
            not_processable.status = status;
            not_processable.external_key =
                status.is_stored().then(|| "KEY1".to_string());
            assert!(!can_process(&not_processable), "{status} is not processable");
        }
    }

    #[test]
    fn test_process_requires_capability() {
        let mut incapable = item();
        incapable.capabilities = CapabilitySnapshot::none();
        assert!(!can_process(&incapable));
    }

    #[test]
    fn test_process_blocked_by_integrity_issue() {
        let mut corrupt = item();
        corrupt.external_key = Some("KEY1".to_string());

        let denial = check_process(&corrupt, true).unwrap_err();
        let message = denial.to_string();
        assert!(message.contains("LINKED_BUT_NOT_STORED"), "{message}");
    }

    #[test]
    fn test_link_and_unlink_are_disjoint() {
        let fresh = item();
        assert!(can_link(&fresh));
        assert!(!can_unlink(&fresh));

        let stored = stored_item("KEY1");
        assert!(!can_link(&stored));
        assert!(can_unlink(&stored));
    }

    #[test]
    fn test_unlink_blocked_until_repaired() {
        let mut broken = item();
        broken.status = ProcessingStatus::Stored;
        broken.external_key = None;
        assert!(!can_unlink(&broken));
    }

    #[test]
    fn test_delete_external_record_safety() {
        let deletable = stored_item("KEY1");
        assert!(can_delete_external_record(&deletable));

        let mut foreign = stored_item("KEY1");
        foreign.created_by_core = false;
        assert!(!can_delete_external_record(&foreign));

        let mut edited = stored_item("KEY1");
        edited.user_modified_externally = true;
        assert!(!can_delete_external_record(&edited));

        let mut shared = stored_item("KEY1");
        shared.linked_count = 2;
        assert!(!can_delete_external_record(&shared));
    }

    #[test]
    fn test_ignore_unignore_mutual_exclusion() {
        let mut probe = item();
        for status in crate::state_machine::transitions::ALL_STATUSES {
            probe.status = status;
            probe.external_key = status.is_stored().then(|| "KEY1".to_string());
            assert!(
                !(can_ignore(&probe) && can_unignore(&probe)),
                "{status} permits both ignore and unignore"
            );
        }
    }

    #[test]
    fn test_ignore_follows_transition_table() {
        let mut stored = stored_item("KEY1");
        assert!(!can_ignore(&stored));
        stored.status = ProcessingStatus::Exhausted;
        stored.external_key = None;
        assert!(can_ignore(&stored));
    }

    #[test]
    fn test_retry_conditions() {
        let mut exhausted = item();
        exhausted.status = ProcessingStatus::Exhausted;
        exhausted.attempts = 3;
        assert!(can_retry(&exhausted));

        let mut retried = item();
        retried.attempts = 1;
        assert!(can_retry(&retried));

        assert!(!can_retry(&item()));
    }

    #[test]
    fn test_available_actions_priority_order() {
        let mut exhausted = item();
        exhausted.status = ProcessingStatus::Exhausted;
        exhausted.attempts = 2;

        let actions = available_actions(&exhausted);
        assert_eq!(
            actions,
            vec![
                ItemAction::Retry,
                ItemAction::Link,
                ItemAction::Reset,
                ItemAction::Ignore,
                ItemAction::Archive,
            ]
        );
    }

    #[test]
    fn test_available_actions_for_stored_item() {
        let stored = stored_item("KEY1");
        let actions = available_actions(&stored);
        assert_eq!(
            actions,
            vec![
                ItemAction::Unlink,
                ItemAction::DeleteExternalRecord,
                ItemAction::Reset,
            ]
        );
    }
}
