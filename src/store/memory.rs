//! # In-Memory Record Store
//!
//! Reference [`RecordStore`] backed by concurrent hash maps. Suitable for
//! tests, single-process deployments, and as a template for durable
//! backends. Patches are applied under the item's shard lock, so each
//! update is atomic with respect to concurrent readers.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::{ProcessingAttempt, TrackedItem};
use crate::store::{ItemPatch, RecordStore, StoreError};

/// DashMap-backed store with store-assigned history sequence numbers
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    items: DashMap<Uuid, TrackedItem>,
    histories: DashMap<Uuid, Vec<ProcessingAttempt>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with the given items
    pub fn with_items(items: impl IntoIterator<Item = TrackedItem>) -> Self {
        let store = Self::new();
        for item in items {
            store.items.insert(item.item_id, item);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, item_id: Uuid) -> Result<TrackedItem, StoreError> {
        self.items
            .get(&item_id)
            .map(|entry| entry.clone())
            .ok_or(StoreError::ItemNotFound { item_id })
    }

    async fn list(&self) -> Result<Vec<TrackedItem>, StoreError> {
        Ok(self.items.iter().map(|entry| entry.clone()).collect())
    }

    async fn insert(&self, item: TrackedItem) -> Result<(), StoreError> {
        match self.items.entry(item.item_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::DuplicateItem {
                item_id: item.item_id,
            }),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(item);
                Ok(())
            }
        }
    }

    async fn update(&self, item_id: Uuid, patch: ItemPatch) -> Result<TrackedItem, StoreError> {
        let mut entry = self
            .items
            .get_mut(&item_id)
            .ok_or(StoreError::ItemNotFound { item_id })?;
        patch.apply(entry.value_mut());
        Ok(entry.clone())
    }

    async fn append_history(&self, mut attempt: ProcessingAttempt) -> Result<u64, StoreError> {
        if !self.items.contains_key(&attempt.item_id) {
            return Err(StoreError::ItemNotFound {
                item_id: attempt.item_id,
            });
        }

        let mut history = self.histories.entry(attempt.item_id).or_default();
        let sequence = history.len() as u64 + 1;
        attempt.sequence = sequence;
        history.push(attempt);
        Ok(sequence)
    }

    async fn history(&self, item_id: Uuid) -> Result<Vec<ProcessingAttempt>, StoreError> {
        if !self.items.contains_key(&item_id) {
            return Err(StoreError::ItemNotFound { item_id });
        }
        Ok(self
            .histories
            .get(&item_id)
            .map(|entries| entries.clone())
            .unwrap_or_default())
    }

    async fn delete(&self, item_id: Uuid) -> Result<TrackedItem, StoreError> {
        let (_, item) = self
            .items
            .remove(&item_id)
            .ok_or(StoreError::ItemNotFound { item_id })?;
        self.histories.remove(&item_id);
        Ok(item)
    }
}
