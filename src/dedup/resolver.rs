//! # Duplicate Resolution
//!
//! Merging a duplicate group keeps one primary item and removes the rest.
//! The resolver proposes a default decision (earliest-created member wins)
//! and applies decisions with safety checks on every destructive step:
//!
//! - the primary item and its external record are never touched
//! - external records are deleted only when their owning item passes the
//!   delete guard and no item outside the merge still references them
//! - anything failing a check is skipped and reported, not an error
//!
//! Failures isolate per group: [`DedupResolver::apply_all`] carries on with
//! the remaining decisions when one group's apply fails.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::constants::events;
use crate::dedup::detector::DuplicateGroup;
use crate::dedup::errors::{DedupError, DedupResult};
use crate::events::EventPublisher;
use crate::state_machine::guards::{self, ItemAction};
use crate::store::{recount_external_key, ItemPatch, RecordStore, StoreError};

/// Deletes records in the external reference manager.
///
/// Failures are tolerated: a record the gateway cannot delete is reported
/// as skipped and the merge proceeds.
#[async_trait]
pub trait ExternalRecordGateway: Send + Sync {
    async fn delete_record(&self, external_key: &str) -> anyhow::Result<()>;
}

/// One group's merge plan. Produced by [`default_resolution`] or built by
/// an operator surface, then applied by [`DedupResolver`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionDecision {
    /// The member that survives the merge
    pub primary_item: Uuid,
    /// The external record the primary keeps, if any
    pub primary_external_key: Option<String>,
    /// Members to remove from the store
    pub items_to_delete: Vec<Uuid>,
    /// External records to delete, subject to safety checks
    pub keys_to_delete: Vec<String>,
    /// Whether secondary metadata fields fill gaps in the primary
    pub merge_metadata: bool,
}

/// A destructive step the resolver refused, with the reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedAction {
    pub target: String,
    pub reason: String,
}

/// What actually happened when a decision was applied
#[derive(Debug, Clone)]
pub struct ResolutionOutcome {
    pub primary_item: Uuid,
    pub removed_items: Vec<Uuid>,
    pub deleted_keys: Vec<String>,
    pub skipped: Vec<SkippedAction>,
    /// Metadata fields copied from secondaries into the primary
    pub merged_fields: usize,
}

/// Result of one decision inside an [`DedupResolver::apply_all`] run
#[derive(Debug)]
pub struct GroupResolution {
    pub primary_item: Uuid,
    pub result: DedupResult<ResolutionOutcome>,
}

/// Default merge plan for a group: the earliest-created member survives
/// (item id breaks ties), keeps the first external key seen in member
/// order, and every other member and key is slated for removal. Metadata
/// merging stays off unless an operator opts in.
pub fn default_resolution(group: &DuplicateGroup) -> ResolutionDecision {
    // detector output is already sorted by created_at, then id
    let primary = &group.items[0];
    let primary_external_key = primary
        .external_key
        .clone()
        .or_else(|| group.external_keys.first().cloned());

    let items_to_delete = group.items[1..].iter().map(|i| i.item_id).collect();
    let keys_to_delete = group
        .external_keys
        .iter()
        .filter(|key| Some(*key) != primary_external_key.as_ref())
        .cloned()
        .collect();

    ResolutionDecision {
        primary_item: primary.item_id,
        primary_external_key,
        items_to_delete,
        keys_to_delete,
        merge_metadata: false,
    }
}

/// Applies merge decisions against the store and the external gateway
pub struct DedupResolver {
    store: Arc<dyn RecordStore>,
    gateway: Arc<dyn ExternalRecordGateway>,
    publisher: EventPublisher,
}

impl DedupResolver {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gateway: Arc<dyn ExternalRecordGateway>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            store,
            gateway,
            publisher,
        }
    }

    /// Apply one group's decision.
    ///
    /// Store infrastructure failures abort the group with an error; safety
    /// refusals and gateway failures are recorded in `skipped` instead.
    #[instrument(skip(self, decision), fields(primary = %decision.primary_item))]
    pub async fn apply_resolution(
        &self,
        decision: &ResolutionDecision,
    ) -> DedupResult<ResolutionOutcome> {
        let primary = match self.store.get(decision.primary_item).await {
            Ok(item) => item,
            Err(StoreError::ItemNotFound { item_id }) => {
                return Err(DedupError::PrimaryMissing { item_id });
            }
            Err(other) => return Err(other.into()),
        };

        let mut skipped = Vec::new();

        let merged_fields = if decision.merge_metadata {
            self.merge_metadata(&primary, &decision.items_to_delete)
                .await?
        } else {
            0
        };

        // External records go first, while their owning items still exist
        // for the safety checks.
        let mut deleted_keys = Vec::new();
        let mut seen_keys = Vec::new();
        for key in &decision.keys_to_delete {
            if seen_keys.contains(key) {
                continue;
            }
            seen_keys.push(key.clone());
            if self.try_delete_record(key, decision, &mut skipped).await? {
                deleted_keys.push(key.clone());
            }
        }

        let mut removed_items = Vec::new();
        let mut keys_to_recount = seen_keys;
        if let Some(key) = &primary.external_key {
            keys_to_recount.push(key.clone());
        }
        for item_id in &decision.items_to_delete {
            if *item_id == decision.primary_item {
                skipped.push(SkippedAction {
                    target: item_id.to_string(),
                    reason: "the primary item is never removed".to_string(),
                });
                continue;
            }
            match self.store.delete(*item_id).await {
                Ok(removed) => {
                    if let Some(key) = removed.external_key {
                        if !keys_to_recount.contains(&key) {
                            keys_to_recount.push(key);
                        }
                    }
                    removed_items.push(*item_id);
                }
                Err(StoreError::ItemNotFound { .. }) => {
                    skipped.push(SkippedAction {
                        target: item_id.to_string(),
                        reason: "item is already absent from the store".to_string(),
                    });
                }
                Err(other) => return Err(other.into()),
            }
        }

        // Survivor links get a fresh count now that the merge settled.
        for key in &keys_to_recount {
            recount_external_key(self.store.as_ref(), key).await?;
        }

        let outcome = ResolutionOutcome {
            primary_item: decision.primary_item,
            removed_items,
            deleted_keys,
            skipped,
            merged_fields,
        };

        if let Err(publish_error) = self
            .publisher
            .publish(
                events::DEDUP_RESOLUTION_APPLIED,
                json!({
                    "primary_item": outcome.primary_item,
                    "removed_items": outcome.removed_items,
                    "deleted_keys": outcome.deleted_keys,
                    "skipped": outcome.skipped.len(),
                    "merged_fields": outcome.merged_fields,
                }),
            )
            .await
        {
            warn!(%publish_error, "Failed to publish dedup resolution event");
        }

        info!(
            primary = %outcome.primary_item,
            removed = outcome.removed_items.len(),
            deleted_keys = outcome.deleted_keys.len(),
            skipped = outcome.skipped.len(),
            "Duplicate group resolved"
        );
        Ok(outcome)
    }

    /// Apply many decisions with per-group isolation: one group's failure
    /// never stops the others.
    pub async fn apply_all(&self, decisions: &[ResolutionDecision]) -> Vec<GroupResolution> {
        let applications = decisions.iter().map(|decision| async {
            GroupResolution {
                primary_item: decision.primary_item,
                result: self.apply_resolution(decision).await,
            }
        });
        join_all(applications).await
    }

    /// Copy metadata fields the primary lacks from the secondaries, in
    /// decision order. The primary's own values always win.
    async fn merge_metadata(
        &self,
        primary: &crate::models::TrackedItem,
        secondary_ids: &[Uuid],
    ) -> DedupResult<usize> {
        let mut merged = primary.metadata.clone();
        let mut added = 0;
        for item_id in secondary_ids {
            let Ok(secondary) = self.store.get(*item_id).await else {
                continue;
            };
            for (field, value) in secondary.metadata {
                if !merged.contains_key(&field) {
                    merged.insert(field, value);
                    added += 1;
                }
            }
        }
        if added > 0 {
            self.store
                .update(primary.item_id, ItemPatch::new().metadata(merged))
                .await?;
        }
        Ok(added)
    }

    /// Returns true when the record was deleted. Refusals and gateway
    /// failures land in `skipped`.
    async fn try_delete_record(
        &self,
        key: &str,
        decision: &ResolutionDecision,
        skipped: &mut Vec<SkippedAction>,
    ) -> DedupResult<bool> {
        if Some(key) == decision.primary_external_key.as_deref() {
            skipped.push(SkippedAction {
                target: key.to_string(),
                reason: "the primary item's external record is never deleted".to_string(),
            });
            return Ok(false);
        }

        let referents: Vec<_> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|item| item.external_key.as_deref() == Some(key))
            .collect();

        if referents.is_empty() {
            skipped.push(SkippedAction {
                target: key.to_string(),
                reason: "no tracked item references this record; safety cannot be verified"
                    .to_string(),
            });
            return Ok(false);
        }
        if let Some(outside) = referents
            .iter()
            .find(|item| !decision.items_to_delete.contains(&item.item_id))
        {
            skipped.push(SkippedAction {
                target: key.to_string(),
                reason: format!(
                    "still referenced by item {} outside this merge",
                    outside.item_id
                ),
            });
            return Ok(false);
        }

        // Refresh the denormalized count before the guard reads it.
        recount_external_key(self.store.as_ref(), key).await?;
        let owner = self.store.get(referents[0].item_id).await?;
        if let Err(denial) = guards::evaluate(&owner, ItemAction::DeleteExternalRecord) {
            skipped.push(SkippedAction {
                target: key.to_string(),
                reason: denial.to_string(),
            });
            return Ok(false);
        }

        match self.gateway.delete_record(key).await {
            Ok(()) => {
                debug!(key, "External record deleted");
                Ok(true)
            }
            Err(gateway_error) => {
                warn!(key, %gateway_error, "Gateway refused to delete external record");
                skipped.push(SkippedAction {
                    target: key.to_string(),
                    reason: format!("gateway failure: {gateway_error:#}"),
                });
                Ok(false)
            }
        }
    }
}

impl std::fmt::Debug for DedupResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupResolver").finish()
    }
}
