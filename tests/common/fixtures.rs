//! Item builders and pipeline assembly helpers.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::broadcast;

use citeline_core::events::{EventPublisher, PublishedEvent};
use citeline_core::models::{TrackedItem, UserIntent};
use citeline_core::orchestration::{
    BatchExecutor, CapabilityAnalyzer, ItemProcessor, StageExecutors, StageResolution,
};
use citeline_core::state_machine::{ProcessingStatus, StatusMachine};
use citeline_core::store::InMemoryRecordStore;

/// Fresh item with full capabilities and auto intent
pub fn url_item(url: &str) -> TrackedItem {
    TrackedItem::new(url)
}

/// Fresh item with an intent
pub fn intent_item(url: &str, intent: UserIntent) -> TrackedItem {
    let mut item = TrackedItem::new(url);
    item.user_intent = intent;
    item
}

/// Item created `minutes_ago`, stored under `external_key` when given
pub fn aged_item(url: &str, minutes_ago: i64, external_key: Option<&str>) -> TrackedItem {
    let mut item = TrackedItem::new(url);
    item.created_at = Utc::now() - Duration::minutes(minutes_ago);
    item.updated_at = item.created_at;
    if let Some(key) = external_key {
        item.status = ProcessingStatus::Stored;
        item.external_key = Some(key.to_string());
        item.created_by_core = true;
        item.linked_count = 1;
    }
    item
}

/// A zotero link resolution created by the pipeline
pub fn linked(key: &str, complete: bool) -> StageResolution {
    StageResolution::Linked {
        external_key: key.to_string(),
        complete,
        created: true,
    }
}

/// Everything a processor or batch test needs, wired over an in-memory store
pub struct TestPipeline {
    pub store: Arc<InMemoryRecordStore>,
    pub machine: Arc<StatusMachine>,
    pub publisher: EventPublisher,
    pub processor: Arc<ItemProcessor>,
}

impl TestPipeline {
    pub fn batch_executor(&self) -> BatchExecutor {
        BatchExecutor::new(
            Arc::clone(&self.processor),
            self.store.clone(),
            self.publisher.clone(),
        )
    }
}

pub fn pipeline_over(items: Vec<TrackedItem>, executors: StageExecutors) -> TestPipeline {
    assemble(items, executors, None)
}

pub fn pipeline_with_analyzer(
    items: Vec<TrackedItem>,
    executors: StageExecutors,
    analyzer: Arc<dyn CapabilityAnalyzer>,
) -> TestPipeline {
    assemble(items, executors, Some(analyzer))
}

fn assemble(
    items: Vec<TrackedItem>,
    executors: StageExecutors,
    analyzer: Option<Arc<dyn CapabilityAnalyzer>>,
) -> TestPipeline {
    let store = Arc::new(InMemoryRecordStore::with_items(items));
    let publisher = EventPublisher::default();
    let machine = Arc::new(StatusMachine::new(store.clone(), publisher.clone()));
    let mut processor = ItemProcessor::new(store.clone(), machine.clone(), executors);
    if let Some(analyzer) = analyzer {
        processor = processor.with_analyzer(analyzer);
    }
    TestPipeline {
        store,
        machine,
        publisher,
        processor: Arc::new(processor),
    }
}

/// Drain everything currently buffered on an event subscription
pub fn drain_events(receiver: &mut broadcast::Receiver<PublishedEvent>) -> Vec<PublishedEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

/// Names of the drained events, in publication order
pub fn drained_names(receiver: &mut broadcast::Receiver<PublishedEvent>) -> Vec<String> {
    drain_events(receiver)
        .into_iter()
        .map(|event| event.name)
        .collect()
}
