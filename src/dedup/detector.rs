//! # Duplicate Detection
//!
//! Scans the whole store, buckets items by normalized URL, and reports
//! every bucket holding more than one item. Groups are ephemeral: they are
//! computed fresh on every scan and never persisted, so detection is always
//! consistent with the store's current contents.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::dedup::errors::DedupResult;
use crate::dedup::normalizer::UrlNormalizer;
use crate::models::TrackedItem;
use crate::store::RecordStore;

/// Items sharing one normalized URL
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    /// The normalized URL the members share
    pub key: String,
    /// Members ordered by creation time, item id as tiebreak
    pub items: Vec<TrackedItem>,
    /// Distinct external record keys held by members, in member order
    pub external_keys: Vec<String>,
}

impl DuplicateGroup {
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Members currently holding an external record key
    pub fn linked_count(&self) -> usize {
        self.items.iter().filter(|i| i.external_key.is_some()).count()
    }
}

/// Finds duplicate groups across the store
pub struct DuplicateDetector {
    store: Arc<dyn RecordStore>,
    normalizer: Arc<dyn UrlNormalizer>,
}

impl DuplicateDetector {
    pub fn new(store: Arc<dyn RecordStore>, normalizer: Arc<dyn UrlNormalizer>) -> Self {
        Self { store, normalizer }
    }

    /// Scan the store and return all groups with more than one member,
    /// sorted by key for deterministic output.
    #[instrument(skip(self))]
    pub async fn detect_duplicates(&self) -> DedupResult<Vec<DuplicateGroup>> {
        let items = self.store.list().await?;
        let scanned = items.len();

        let mut buckets: HashMap<String, Vec<TrackedItem>> = HashMap::new();
        for item in items {
            let key = self.normalizer.normalize(&item.url);
            buckets.entry(key).or_default().push(item);
        }

        let mut groups: Vec<DuplicateGroup> = buckets
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|(key, mut members)| {
                members.sort_by(|a, b| {
                    a.created_at
                        .cmp(&b.created_at)
                        .then_with(|| a.item_id.cmp(&b.item_id))
                });
                let mut external_keys = Vec::new();
                for member in &members {
                    if let Some(external_key) = &member.external_key {
                        if !external_keys.contains(external_key) {
                            external_keys.push(external_key.clone());
                        }
                    }
                }
                DuplicateGroup {
                    key,
                    items: members,
                    external_keys,
                }
            })
            .collect();
        groups.sort_by(|a, b| a.key.cmp(&b.key));

        debug!(scanned, groups = groups.len(), "Duplicate scan finished");
        Ok(groups)
    }
}

impl std::fmt::Debug for DuplicateDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateDetector").finish()
    }
}
