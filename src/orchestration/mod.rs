//! # Pipeline Orchestration
//!
//! Everything that drives items through the extraction pipeline sits here:
//!
//! - [`error_classifier`]: sorts stage failures into the retry/cascade
//!   taxonomy and computes backoff delays
//! - [`cascade`]: decides whether a failed stage falls through to the next
//!   one or the item exhausts
//! - [`stage`]: the pluggable stage-executor seam and the contract mapping
//!   stage resolutions onto statuses
//! - [`processor`]: runs a single item end to end
//! - [`batch`]: bounded-concurrency batch runs with pause, resume, cancel,
//!   and per-item progress
//!
//! The orchestration layer owns no persistence and no state-transition
//! rules; it composes the status machine, the record store, and the
//! deployment's stage executors.

pub mod batch;
pub mod cascade;
pub mod error_classifier;
pub mod errors;
pub mod processor;
pub mod stage;

pub use batch::{BatchExecutor, BatchOptions, BatchProgress, BatchSummary, RunningBatch};
pub use cascade::{decide, next_stage, should_auto_cascade, CascadeDecision};
pub use error_classifier::{
    retry_delay, BackoffPolicy, ErrorCategory, ErrorClassification, ErrorClassifier,
    HttpStatusError,
};
pub use errors::{OrchestrationError, OrchestrationResult};
pub use processor::{ItemOutcome, ItemProcessor, ItemRunReport};
pub use stage::{
    resolution_outcome, CapabilityAnalyzer, StageContractViolation, StageExecutor,
    StageExecutors, StageOutcome, StageResolution, StageSuccess,
};
