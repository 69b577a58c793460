//! # Status Machine
//!
//! Commits status transitions for tracked items. Every commit follows the
//! same pipeline: validate against the transition table, load the current
//! snapshot, apply the patch (including external-key hygiene) atomically,
//! append the history entry, then dispatch side-effect hooks.
//!
//! ## Optimistic Transitions
//!
//! `transition` takes the status the caller believes the item is in. When
//! the loaded status differs, the commit proceeds anyway (last writer wins)
//! and the drift is logged and recorded on the history entry. Guard
//! re-evaluation immediately before every mutating call keeps the window
//! short; a missed race surfaces later as an integrity violation the repair
//! tooling resolves.
//!
//! ## Key Hygiene
//!
//! The machine owns the invariant that an external key is present exactly
//! when the status is a stored status. Transitions into a stored status
//! require a key (from the context or already on the item); transitions out
//! clear it in the same atomic write.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::constants::events;
use crate::events::publisher::EventPublisher;
use crate::models::{ProcessingMethod, TrackedItem};
use crate::state_machine::actions::TransitionHooks;
use crate::state_machine::errors::{StateMachineError, StateMachineResult};
use crate::state_machine::integrity::{
    integrity_issues, suggest_repair, IntegrityIssue, RepairAction,
};
use crate::state_machine::states::ProcessingStatus;
use crate::state_machine::transitions::can_transition;
use crate::store::{recount_external_key, ItemPatch, RecordStore};
use uuid::Uuid;

/// Caller-supplied context for a transition commit
#[derive(Debug, Clone, Default)]
pub struct TransitionContext {
    /// Key to link when entering a stored status
    pub external_key: Option<String>,
    /// Whether the linked record was created by this pipeline
    pub created_by_core: Option<bool>,
    /// The method that produced the link
    pub method: Option<ProcessingMethod>,
    /// Free-form context recorded on the history entry
    pub metadata: Value,
}

impl TransitionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context carrying only a trigger tag for the history entry
    pub fn triggered_by(trigger: &str) -> Self {
        Self {
            metadata: json!({ "trigger": trigger }),
            ..Self::default()
        }
    }

    pub fn external_key(mut self, key: impl Into<String>) -> Self {
        self.external_key = Some(key.into());
        self
    }

    pub fn created_by_core(mut self, flag: bool) -> Self {
        self.created_by_core = Some(flag);
        self
    }

    pub fn method(mut self, method: ProcessingMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Result of an applied integrity repair
#[derive(Debug, Clone)]
pub struct AppliedRepair {
    pub issue: IntegrityIssue,
    pub action: RepairAction,
    pub item: TrackedItem,
}

/// Transition commit engine for tracked items
pub struct StatusMachine {
    store: Arc<dyn RecordStore>,
    publisher: EventPublisher,
    hooks: TransitionHooks,
}

impl StatusMachine {
    /// Machine with the standard hook set (log, publish, exhaustion alert)
    pub fn new(store: Arc<dyn RecordStore>, publisher: EventPublisher) -> Self {
        let hooks = TransitionHooks::standard(publisher.clone());
        Self {
            store,
            publisher,
            hooks,
        }
    }

    /// Machine with a caller-supplied hook set
    pub fn with_hooks(
        store: Arc<dyn RecordStore>,
        publisher: EventPublisher,
        hooks: TransitionHooks,
    ) -> Self {
        Self {
            store,
            publisher,
            hooks,
        }
    }

    /// Commit `from -> to` for the item.
    ///
    /// Illegal pairs are rejected before anything is written, so a failed
    /// transition appends nothing to history. Returns the updated item.
    #[instrument(skip(self, context), fields(item_id = %item_id, from = %from, to = %to))]
    pub async fn transition(
        &self,
        item_id: Uuid,
        from: ProcessingStatus,
        to: ProcessingStatus,
        context: TransitionContext,
    ) -> StateMachineResult<TrackedItem> {
        if !can_transition(from, to) {
            return Err(StateMachineError::InvalidTransition { from, to });
        }

        let item = self.store.get(item_id).await?;

        let mut history_meta = normalize_metadata(context.metadata);
        if item.status != from {
            warn!(
                item_id = %item_id,
                expected = %from,
                observed = %item.status,
                "Item status drifted since guard check, proceeding optimistically"
            );
            history_meta.insert("observed_status".to_string(), json!(item.status));
        }

        let old_key = item.external_key.clone();
        let mut patch = ItemPatch::new().status(to);

        if to.is_stored() {
            let key = context
                .external_key
                .clone()
                .or_else(|| item.external_key.clone())
                .ok_or(StateMachineError::ExternalKeyRequired { to })?;
            patch = patch.link(key);
            if let Some(flag) = context.created_by_core {
                patch = patch.created_by_core(flag);
            }
            if let Some(method) = context.method {
                patch = patch.last_method(Some(method));
            }
        } else if item.external_key.is_some() {
            // Leaving the stored statuses detaches the record and the
            // link-scoped flags along with it.
            patch = patch
                .unlink()
                .linked_count(0)
                .created_by_core(false)
                .user_modified_externally(false)
                .last_method(None);
        }

        let updated = self.store.update(item_id, patch).await?;
        self.store
            .append_history(crate::models::ProcessingAttempt::transition(
                item_id,
                from,
                to,
                Value::Object(history_meta),
            ))
            .await?;

        let mut recounted = false;
        if let Some(ref new_key) = updated.external_key {
            if old_key.as_deref() != Some(new_key.as_str()) {
                recount_external_key(self.store.as_ref(), new_key).await?;
                recounted = true;
            }
        }
        if let Some(ref old) = old_key {
            if updated.external_key.as_deref() != Some(old.as_str()) {
                recount_external_key(self.store.as_ref(), old).await?;
                recounted = true;
            }
        }

        let committed = if recounted {
            self.store.get(item_id).await?
        } else {
            updated
        };

        self.hooks.run(&committed, from, to).await;
        Ok(committed)
    }

    /// All integrity violations currently on the item
    pub async fn integrity_issues(&self, item_id: Uuid) -> StateMachineResult<Vec<IntegrityIssue>> {
        let item = self.store.get(item_id).await?;
        Ok(integrity_issues(&item))
    }

    /// Apply the deterministic repair for the item's violation pattern.
    ///
    /// Repairs are force-writes: they bypass the transition table, because
    /// the item is by definition in a state the table never produces. The
    /// committed history entry carries an `integrity_repair` flag, and the
    /// item must come out with zero issues.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn apply_repair(&self, item_id: Uuid) -> StateMachineResult<AppliedRepair> {
        let item = self.store.get(item_id).await?;
        let proposal =
            suggest_repair(&item).ok_or(StateMachineError::NothingToRepair { item_id })?;

        let from = item.status;
        let old_key = item.external_key.clone();
        let patch = match proposal.action {
            RepairAction::ForceStatus(status) => ItemPatch::new().status(status),
            RepairAction::UnlinkKey => ItemPatch::new()
                .unlink()
                .linked_count(0)
                .created_by_core(false)
                .user_modified_externally(false)
                .last_method(None),
        };

        let updated = self.store.update(item_id, patch).await?;

        let remaining = integrity_issues(&updated);
        if !remaining.is_empty() {
            let codes: Vec<&str> = remaining.iter().map(|issue| issue.code()).collect();
            return Err(StateMachineError::RepairIncomplete {
                item_id,
                remaining: codes.join(", "),
            });
        }

        self.store
            .append_history(crate::models::ProcessingAttempt::transition(
                item_id,
                from,
                updated.status,
                json!({
                    "integrity_repair": true,
                    "issue": proposal.issue.code(),
                }),
            ))
            .await?;

        let committed = match (proposal.action, old_key.as_deref()) {
            (RepairAction::UnlinkKey, Some(key)) => {
                recount_external_key(self.store.as_ref(), key).await?;
                self.store.get(item_id).await?
            }
            (RepairAction::ForceStatus(_), Some(key)) => {
                recount_external_key(self.store.as_ref(), key).await?;
                self.store.get(item_id).await?
            }
            _ => updated,
        };

        info!(
            item_id = %item_id,
            issue = proposal.issue.code(),
            from = %from,
            to = %committed.status,
            "Integrity repair applied"
        );
        if let Err(error) = self
            .publisher
            .publish(
                events::ITEM_REPAIRED,
                json!({
                    "item_id": item_id,
                    "issue": proposal.issue.code(),
                    "from": from,
                    "to": committed.status,
                }),
            )
            .await
        {
            warn!(item_id = %item_id, error = %error, "Repair event publication failed");
        }

        Ok(AppliedRepair {
            issue: proposal.issue,
            action: proposal.action,
            item: committed,
        })
    }
}

/// Coerce caller metadata into an object the commit can annotate
fn normalize_metadata(metadata: Value) -> serde_json::Map<String, Value> {
    match metadata {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("context".to_string(), other);
            map
        }
    }
}
