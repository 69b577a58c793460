//! # Record Store
//!
//! Pluggable persistence seam for tracked items and their processing history.
//!
//! The state machine, orchestration, and dedup layers all talk to storage
//! through [`RecordStore`], so deployments can swap the bundled in-memory
//! implementation for a durable backend without touching pipeline logic.
//!
//! ## Concurrency Model
//!
//! `update` applies an [`ItemPatch`] atomically: compound writes such as
//! "set status and clear the external key" land in one operation so readers
//! never observe an item that is half-transitioned. History appends are
//! store-sequenced, which keeps ordering stable under concurrent appenders.

pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::{CapabilitySnapshot, ProcessingAttempt, ProcessingMethod, TrackedItem, UserIntent};
use crate::state_machine::states::ProcessingStatus;

pub use memory::InMemoryRecordStore;

/// Errors surfaced by record store implementations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Tracked item {item_id} not found")]
    ItemNotFound { item_id: Uuid },

    #[error("Tracked item {item_id} already exists")]
    DuplicateItem { item_id: Uuid },

    #[error("Record store backend failure: {0}")]
    Backend(String),
}

/// Partial update applied to a tracked item in a single atomic write.
///
/// Unset fields keep their current value. `external_key` and `last_method`
/// are doubly optional so a patch can distinguish "leave alone" from
/// "clear the value".
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub status: Option<ProcessingStatus>,
    pub user_intent: Option<UserIntent>,
    pub external_key: Option<Option<String>>,
    pub created_by_core: Option<bool>,
    pub user_modified_externally: Option<bool>,
    pub linked_count: Option<u32>,
    pub attempts: Option<u32>,
    pub last_method: Option<Option<ProcessingMethod>>,
    pub capabilities: Option<CapabilitySnapshot>,
    pub metadata: Option<Map<String, Value>>,
}

impl ItemPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.user_intent.is_none()
            && self.external_key.is_none()
            && self.created_by_core.is_none()
            && self.user_modified_externally.is_none()
            && self.linked_count.is_none()
            && self.attempts.is_none()
            && self.last_method.is_none()
            && self.capabilities.is_none()
            && self.metadata.is_none()
    }

    pub fn status(mut self, status: ProcessingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn user_intent(mut self, intent: UserIntent) -> Self {
        self.user_intent = Some(intent);
        self
    }

    /// Attach an external record key
    pub fn link(mut self, key: impl Into<String>) -> Self {
        self.external_key = Some(Some(key.into()));
        self
    }

    /// Detach the external record key
    pub fn unlink(mut self) -> Self {
        self.external_key = Some(None);
        self
    }

    pub fn created_by_core(mut self, flag: bool) -> Self {
        self.created_by_core = Some(flag);
        self
    }

    pub fn user_modified_externally(mut self, flag: bool) -> Self {
        self.user_modified_externally = Some(flag);
        self
    }

    pub fn linked_count(mut self, count: u32) -> Self {
        self.linked_count = Some(count);
        self
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn last_method(mut self, method: Option<ProcessingMethod>) -> Self {
        self.last_method = Some(method);
        self
    }

    pub fn capabilities(mut self, capabilities: CapabilitySnapshot) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Apply this patch to an item, refreshing its `updated_at` stamp
    pub fn apply(&self, item: &mut TrackedItem) {
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(intent) = self.user_intent {
            item.user_intent = intent;
        }
        if let Some(ref key) = self.external_key {
            item.external_key = key.clone();
        }
        if let Some(flag) = self.created_by_core {
            item.created_by_core = flag;
        }
        if let Some(flag) = self.user_modified_externally {
            item.user_modified_externally = flag;
        }
        if let Some(count) = self.linked_count {
            item.linked_count = count;
        }
        if let Some(attempts) = self.attempts {
            item.attempts = attempts;
        }
        if let Some(method) = self.last_method {
            item.last_method = method;
        }
        if let Some(capabilities) = self.capabilities {
            item.capabilities = capabilities;
        }
        if let Some(ref metadata) = self.metadata {
            item.metadata = metadata.clone();
        }
        item.updated_at = chrono::Utc::now();
    }
}

/// Storage operations the pipeline needs from a backend
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a tracked item by id
    async fn get(&self, item_id: Uuid) -> Result<TrackedItem, StoreError>;

    /// List every tracked item
    async fn list(&self) -> Result<Vec<TrackedItem>, StoreError>;

    /// Insert a new tracked item, failing on id collision
    async fn insert(&self, item: TrackedItem) -> Result<(), StoreError>;

    /// Apply a patch atomically and return the updated item
    async fn update(&self, item_id: Uuid, patch: ItemPatch) -> Result<TrackedItem, StoreError>;

    /// Append a history entry, returning the store-assigned sequence number
    async fn append_history(&self, attempt: ProcessingAttempt) -> Result<u64, StoreError>;

    /// Full history for an item, ordered by sequence number
    async fn history(&self, item_id: Uuid) -> Result<Vec<ProcessingAttempt>, StoreError>;

    /// Remove an item and its history, returning the removed item
    async fn delete(&self, item_id: Uuid) -> Result<TrackedItem, StoreError>;
}

/// Recompute `linked_count` for every item referencing `external_key`.
///
/// Counts are always derived from the actual links rather than adjusted
/// in place, so link and unlink paths cannot drift out of sync. Returns
/// the recomputed count.
pub async fn recount_external_key(
    store: &dyn RecordStore,
    external_key: &str,
) -> Result<u32, StoreError> {
    let referencing: Vec<TrackedItem> = store
        .list()
        .await?
        .into_iter()
        .filter(|item| item.external_key.as_deref() == Some(external_key))
        .collect();
    let count = referencing.len() as u32;

    for item in referencing {
        if item.linked_count != count {
            store
                .update(item.item_id, ItemPatch::new().linked_count(count))
                .await?;
        }
    }

    Ok(count)
}
