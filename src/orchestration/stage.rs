//! # Stage Execution Contract
//!
//! The pipeline drives three kinds of stage work through one seam:
//! identifier lookup against the reference manager, content fetch with
//! candidate search, and LLM metadata extraction. Deployments plug real
//! collaborators in behind [`StageExecutor`]; the core only interprets the
//! declared resolution and never inspects payloads.
//!
//! Each stage admits a fixed set of resolutions. Anything else is a contract
//! violation and is treated as a permanent failure, not a panic: a buggy
//! executor should strand one item in `exhausted`, not take the process
//! down.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{CapabilitySnapshot, TrackedItem};
use crate::state_machine::states::{PipelineStage, ProcessingStatus};

/// How a successful stage run resolved
#[derive(Debug, Clone, PartialEq)]
pub enum StageResolution {
    /// An external record now exists for the item; `complete` reports
    /// whether its metadata passed the completeness bar, `created` whether
    /// the stage created the record rather than matching a pre-existing one
    Linked {
        external_key: String,
        complete: bool,
        created: bool,
    },
    /// Content fetch surfaced candidate matches a human must choose from
    CandidatesFound,
    /// Content fetch extracted raw content; extraction continues with LLM
    ContentExtracted,
    /// LLM produced metadata proposals a human must approve
    MetadataProposed,
}

impl StageResolution {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Linked { .. } => "linked",
            Self::CandidatesFound => "candidates_found",
            Self::ContentExtracted => "content_extracted",
            Self::MetadataProposed => "metadata_proposed",
        }
    }
}

/// Successful stage result: a resolution plus an opaque payload.
///
/// The payload (candidate lists, extracted content, metadata proposals) is
/// recorded in item history for operator surfaces but never interpreted
/// here.
#[derive(Debug, Clone)]
pub struct StageSuccess {
    pub resolution: StageResolution,
    pub payload: Value,
}

impl StageSuccess {
    pub fn new(resolution: StageResolution) -> Self {
        Self {
            resolution,
            payload: Value::Null,
        }
    }

    pub fn with_payload(resolution: StageResolution, payload: Value) -> Self {
        Self {
            resolution,
            payload,
        }
    }
}

/// One pluggable pipeline stage implementation
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// The stage this executor serves
    fn stage(&self) -> PipelineStage;

    /// Run the stage against a snapshot of the item.
    ///
    /// Errors are classified (network, client, permanent) to decide retry
    /// and cascade behavior; executors should return typed
    /// [`HttpStatusError`](crate::orchestration::HttpStatusError)s where
    /// they can.
    async fn execute(&self, item: &TrackedItem) -> anyhow::Result<StageSuccess>;
}

/// Reports which processing paths are currently feasible for an item.
///
/// Consulted once per processor run, before guard evaluation, so the stored
/// snapshot never goes stale by more than one run.
#[async_trait]
pub trait CapabilityAnalyzer: Send + Sync {
    async fn analyze(&self, item: &TrackedItem) -> CapabilitySnapshot;
}

/// Registry of stage executors, keyed by the stage they declare
#[derive(Clone, Default)]
pub struct StageExecutors {
    executors: HashMap<PipelineStage, Arc<dyn StageExecutor>>,
}

impl StageExecutors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor under its own declared stage. A later
    /// registration for the same stage replaces the earlier one.
    #[must_use]
    pub fn register(mut self, executor: Arc<dyn StageExecutor>) -> Self {
        self.executors.insert(executor.stage(), executor);
        self
    }

    pub fn get(&self, stage: PipelineStage) -> Option<Arc<dyn StageExecutor>> {
        self.executors.get(&stage).cloned()
    }

    pub fn contains(&self, stage: PipelineStage) -> bool {
        self.executors.contains_key(&stage)
    }
}

impl std::fmt::Debug for StageExecutors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageExecutors")
            .field("stages", &self.executors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A stage declared a resolution its contract does not admit
#[derive(Debug, Clone, thiserror::Error)]
#[error("Stage '{stage}' returned resolution '{resolution}', which its contract does not admit")]
pub struct StageContractViolation {
    pub stage: PipelineStage,
    pub resolution: &'static str,
}

/// What a valid stage resolution means for the item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The run stops with the item committed to this status
    Settle(ProcessingStatus),
    /// Processing continues in the same run with another stage
    Continue(PipelineStage),
}

/// Map a stage's resolution onto the item's next move.
///
/// - zotero + linked: `stored` when complete, `stored_incomplete` otherwise
/// - content + candidates: `awaiting_selection`
/// - content + extracted content: continue with the LLM stage
/// - llm + proposed metadata: `awaiting_metadata`
///
/// Every other combination violates the stage contract.
pub fn resolution_outcome(
    stage: PipelineStage,
    resolution: &StageResolution,
) -> Result<StageOutcome, StageContractViolation> {
    match (stage, resolution) {
        (PipelineStage::Zotero, StageResolution::Linked { complete, .. }) => {
            let status = if *complete {
                ProcessingStatus::Stored
            } else {
                ProcessingStatus::StoredIncomplete
            };
            Ok(StageOutcome::Settle(status))
        }
        (PipelineStage::Content, StageResolution::CandidatesFound) => {
            Ok(StageOutcome::Settle(ProcessingStatus::AwaitingSelection))
        }
        (PipelineStage::Content, StageResolution::ContentExtracted) => {
            Ok(StageOutcome::Continue(PipelineStage::Llm))
        }
        (PipelineStage::Llm, StageResolution::MetadataProposed) => {
            Ok(StageOutcome::Settle(ProcessingStatus::AwaitingMetadata))
        }
        (stage, other) => Err(StageContractViolation {
            stage,
            resolution: other.kind(),
        }),
    }
}
