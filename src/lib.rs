#![allow(clippy::doc_markdown)] // Allow technical terms like URLs, LLM in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Citeline Core
//!
//! Guarded workflow engine that turns tracked URL references into persisted
//! citations. Each tracked item carries a twelve-status lifecycle and moves
//! through a three-stage extraction pipeline: identifier lookup against a
//! reference manager, content fetch with candidate search, and LLM metadata
//! extraction, with human review points where automation cannot decide.
//!
//! ## Key properties
//!
//! - **One transition table.** Every status change, automatic or manual,
//!   validates against the same table; integrity repairs are the only
//!   sanctioned bypass and are flagged in history.
//! - **Optimistic concurrency.** No item locks; concurrent writers proceed
//!   last-writer-wins, with drift recorded in the append-only history.
//! - **Classified failures.** Errors sort into network / http_client /
//!   permanent / unknown, driving exponential backoff and stage cascade
//!   decisions.
//! - **Bounded batches.** Batch runs hold a fixed worker pool with pause,
//!   resume, cancel, and per-item progress reporting.
//! - **Safe deduplication.** URL-normalized duplicate groups merge down to
//!   one survivor, with every destructive step behind the same guards
//!   operators face.
//!
//! ## Module Organization
//!
//! - [`models`] - Tracked items, capability snapshots, and history records
//! - [`store`] - The persistence seam and the in-memory reference store
//! - [`state_machine`] - Statuses, the transition table, guards, integrity
//!   rules, and the commit machine
//! - [`orchestration`] - Error classification, cascade control, the item
//!   processor, and batch execution
//! - [`dedup`] - URL normalization, duplicate detection, and resolution
//! - [`events`] - Broadcast event publishing
//! - [`config`] - Layered, validated configuration
//! - [`error`] - Crate-level error aggregation
//! - [`logging`] - Tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use citeline_core::events::EventPublisher;
//! use citeline_core::models::TrackedItem;
//! use citeline_core::orchestration::{ItemProcessor, StageExecutors};
//! use citeline_core::state_machine::StatusMachine;
//! use citeline_core::store::{InMemoryRecordStore, RecordStore};
//!
//! # async fn example(executors: StageExecutors) -> Result<(), Box<dyn std::error::Error>> {
//! let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());
//! let publisher = EventPublisher::default();
//! let machine = Arc::new(StatusMachine::new(Arc::clone(&store), publisher.clone()));
//!
//! let item = TrackedItem::new("https://example.com/paper");
//! let item_id = item.item_id;
//! store.insert(item).await?;
//!
//! let processor = ItemProcessor::new(store, machine, executors);
//! let report = processor.process_item(item_id, true).await?;
//! println!("settled in {}", report.final_status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod dedup;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;
pub mod store;

// Curated re-exports for the common assembly path
pub use config::{ConfigManager, CoreConfig};
pub use dedup::{
    default_resolution, DedupResolver, DuplicateDetector, DuplicateGroup, ExternalRecordGateway,
    ResolutionDecision, ResolutionOutcome, StandardUrlNormalizer, UrlNormalizer,
};
pub use error::{CoreError, Result};
pub use events::{EventPublisher, PublishedEvent};
pub use logging::init_structured_logging;
pub use models::{
    CapabilitySnapshot, ProcessingAttempt, ProcessingMethod, TrackedItem, UserIntent,
};
pub use orchestration::{
    BatchExecutor, BatchOptions, BatchProgress, BatchSummary, CapabilityAnalyzer, ErrorCategory,
    ErrorClassification, ErrorClassifier, HttpStatusError, ItemOutcome, ItemProcessor,
    ItemRunReport, RunningBatch, StageExecutor, StageExecutors, StageResolution, StageSuccess,
};
pub use state_machine::{
    PipelineStage, ProcessingStatus, StatusMachine, TransitionContext,
};
pub use store::{InMemoryRecordStore, ItemPatch, RecordStore, StoreError};
