//! # Item Processor
//!
//! Runs one item through the automatic pipeline: pick an entry stage from
//! the capability snapshot, walk the item into the matching processing
//! status, execute the stage, then either settle on success or consult the
//! cascade controller on failure. A single run may touch several stages but
//! counts as exactly one attempt on the item.
//!
//! ## Run shape
//!
//! ```text
//! refresh capabilities -> guard check -> enter stage -> execute
//!        |                                    ^            |
//!        v                                    |       ok: settle or
//!   skipped report                      cascade advance   continue (llm)
//!                                             |            |
//!                                             +-- err: classify, decide
//!                                                       |
//!                                                  exhaust -> failed
//! ```
//!
//! The processor holds no item locks. Transitions are optimistic; if a
//! human moved the item mid-run, the status machine records the drift and
//! the run proceeds last-writer-wins.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::models::{ProcessingAttempt, ProcessingMethod, TrackedItem};
use crate::orchestration::cascade::{self, CascadeDecision};
use crate::orchestration::error_classifier::{ErrorClassification, ErrorClassifier};
use crate::orchestration::errors::{OrchestrationError, OrchestrationResult};
use crate::orchestration::stage::{
    resolution_outcome, CapabilityAnalyzer, StageExecutor, StageExecutors, StageOutcome,
    StageResolution, StageSuccess,
};
use crate::state_machine::guards;
use crate::state_machine::machine::{StatusMachine, TransitionContext};
use crate::state_machine::states::{PipelineStage, ProcessingStatus};
use crate::store::{ItemPatch, RecordStore};

/// How a processor run over one item ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The item settled in a stored or awaiting-review status
    Completed,
    /// The item settled in `exhausted`
    Failed,
    /// Guards or capabilities kept the item out of the pipeline entirely
    Skipped,
}

/// Result of one processor run
#[derive(Debug, Clone)]
pub struct ItemRunReport {
    pub item_id: Uuid,
    pub outcome: ItemOutcome,
    pub final_status: ProcessingStatus,
    /// Stages executed, in order
    pub stages_run: Vec<PipelineStage>,
    /// The item's attempt count after this run
    pub attempt: u32,
    /// Failure summary when the run ended in `Failed`
    pub last_error: Option<String>,
    /// Suggested wait before a future retry, when the last failure was
    /// retryable
    pub retry_delay: Option<Duration>,
    /// Guard or capability denial when the run was `Skipped`
    pub skip_reason: Option<String>,
}

impl ItemRunReport {
    fn skipped(item: &TrackedItem, reason: String) -> Self {
        Self {
            item_id: item.item_id,
            outcome: ItemOutcome::Skipped,
            final_status: item.status,
            stages_run: Vec::new(),
            attempt: item.attempts,
            last_error: None,
            retry_delay: None,
            skip_reason: Some(reason),
        }
    }
}

/// Drives single items through the pipeline
pub struct ItemProcessor {
    store: Arc<dyn RecordStore>,
    machine: Arc<StatusMachine>,
    executors: StageExecutors,
    analyzer: Option<Arc<dyn CapabilityAnalyzer>>,
    classifier: ErrorClassifier,
}

impl ItemProcessor {
    pub fn new(
        store: Arc<dyn RecordStore>,
        machine: Arc<StatusMachine>,
        executors: StageExecutors,
    ) -> Self {
        Self {
            store,
            machine,
            executors,
            analyzer: None,
            classifier: ErrorClassifier::new(),
        }
    }

    /// Attach a capability analyzer. Without one, the stored snapshot is
    /// trusted as-is.
    #[must_use]
    pub fn with_analyzer(mut self, analyzer: Arc<dyn CapabilityAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Run one item through the pipeline.
    ///
    /// Returns `Ok` with a report for every settled run, including guard
    /// skips and exhaustion. `Err` is reserved for infrastructure problems:
    /// store failures, an unregistered entry-stage executor, or an illegal
    /// transition, all of which leave the item unsettled.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn process_item(
        &self,
        item_id: Uuid,
        respect_user_intent: bool,
    ) -> OrchestrationResult<ItemRunReport> {
        let mut item = self.store.get(item_id).await?;

        // Refresh the capability snapshot before the guard reads it.
        if let Some(analyzer) = &self.analyzer {
            let snapshot = analyzer.analyze(&item).await;
            if snapshot != item.capabilities {
                item = self
                    .store
                    .update(item_id, ItemPatch::new().capabilities(snapshot))
                    .await?;
            }
        }

        if let Err(denial) = guards::check_process(&item, respect_user_intent) {
            debug!(item_id = %item_id, %denial, "Item is not processable, skipping");
            return Ok(ItemRunReport::skipped(&item, denial.to_string()));
        }

        let Some(entry) = entry_stage(&item) else {
            return Ok(ItemRunReport::skipped(
                &item,
                "no entry stage is feasible for the current capabilities".to_string(),
            ));
        };
        let mut executor = self
            .executors
            .get(entry)
            .ok_or(OrchestrationError::StageExecutorMissing { stage: entry })?;

        // One attempt per run, no matter how many stages the run touches.
        let attempt = item.attempts + 1;
        item = self
            .store
            .update(item_id, ItemPatch::new().attempts(attempt))
            .await?;
        let intent = item.user_intent;

        let mut stage = entry;
        let mut status = item.status;
        let mut stages_run = Vec::new();
        let mut last_error: Option<String> = None;
        let mut retry_delay: Option<Duration> = None;

        let outcome = loop {
            item = self
                .machine
                .transition(
                    item_id,
                    status,
                    stage.as_status(),
                    TransitionContext::new().metadata(json!({
                        "trigger": "processor",
                        "stage": stage,
                        "attempt": attempt,
                    })),
                )
                .await?;
            status = item.status;
            stages_run.push(stage);

            match executor.execute(&item).await {
                Ok(success) => match resolution_outcome(stage, &success.resolution) {
                    Ok(StageOutcome::Continue(next)) => {
                        self.record_stage_success(item_id, stage, attempt, &success)
                            .await?;
                        match self.advance_executor(next) {
                            Some(found) => {
                                executor = found;
                                stage = next;
                            }
                            None => {
                                last_error =
                                    Some(format!("no executor registered for stage '{next}'"));
                                item = self
                                    .exhaust(
                                        item_id,
                                        status,
                                        json!({
                                            "trigger": "cascade",
                                            "reason": "missing_stage_executor",
                                            "stage": next,
                                        }),
                                    )
                                    .await?;
                                status = item.status;
                                break ItemOutcome::Failed;
                            }
                        }
                    }
                    Ok(StageOutcome::Settle(next)) => {
                        self.record_stage_success(item_id, stage, attempt, &success)
                            .await?;
                        let mut context = TransitionContext::new().metadata(json!({
                            "trigger": "processor",
                            "stage": stage,
                            "resolution": success.resolution.kind(),
                        }));
                        if let StageResolution::Linked {
                            external_key,
                            created,
                            ..
                        } = &success.resolution
                        {
                            context = context
                                .external_key(external_key.clone())
                                .created_by_core(*created)
                                .method(ProcessingMethod::from_stage(stage));
                        }
                        item = self.machine.transition(item_id, status, next, context).await?;
                        status = item.status;
                        break ItemOutcome::Completed;
                    }
                    Err(violation) => {
                        warn!(item_id = %item_id, %violation, "Stage broke its resolution contract");
                        self.store
                            .append_history(ProcessingAttempt::stage(
                                item_id,
                                stage,
                                false,
                                Some(violation.to_string()),
                                json!({
                                    "category": "permanent",
                                    "contract_violation": true,
                                    "attempt": attempt,
                                }),
                            ))
                            .await?;
                        last_error = Some(violation.to_string());
                        item = self
                            .exhaust(
                                item_id,
                                status,
                                json!({ "trigger": "cascade", "reason": "contract_violation" }),
                            )
                            .await?;
                        status = item.status;
                        break ItemOutcome::Failed;
                    }
                },
                Err(error) => {
                    let classification = self.classifier.classify(&error, attempt);
                    self.record_stage_failure(item_id, stage, attempt, &classification)
                        .await?;

                    match cascade::decide(status, classification, intent) {
                        CascadeDecision::Advance { to, classification } => {
                            debug!(
                                item_id = %item_id,
                                from = %stage,
                                to = %to,
                                category = %classification.category,
                                "Cascading to the next stage"
                            );
                            match self.advance_executor(to) {
                                Some(found) => {
                                    executor = found;
                                    stage = to;
                                }
                                None => {
                                    last_error = Some(classification.message);
                                    item = self
                                        .exhaust(
                                            item_id,
                                            status,
                                            json!({
                                                "trigger": "cascade",
                                                "reason": "missing_stage_executor",
                                                "stage": to,
                                            }),
                                        )
                                        .await?;
                                    status = item.status;
                                    break ItemOutcome::Failed;
                                }
                            }
                        }
                        CascadeDecision::Exhaust { classification } => {
                            last_error = Some(classification.message.clone());
                            retry_delay = classification
                                .retryable
                                .then_some(classification.retry_delay);
                            item = self
                                .exhaust(
                                    item_id,
                                    status,
                                    json!({
                                        "trigger": "cascade",
                                        "category": classification.category,
                                    }),
                                )
                                .await?;
                            status = item.status;
                            break ItemOutcome::Failed;
                        }
                    }
                }
            }
        };

        info!(
            item_id = %item_id,
            final_status = %status,
            stages = stages_run.len(),
            ?outcome,
            "Processor run settled"
        );
        Ok(ItemRunReport {
            item_id,
            outcome,
            final_status: status,
            stages_run,
            attempt,
            last_error,
            retry_delay,
            skip_reason: None,
        })
    }

    fn advance_executor(&self, stage: PipelineStage) -> Option<Arc<dyn StageExecutor>> {
        let found = self.executors.get(stage);
        if found.is_none() {
            warn!(%stage, "No executor registered for cascade target");
        }
        found
    }

    async fn record_stage_success(
        &self,
        item_id: Uuid,
        stage: PipelineStage,
        attempt: u32,
        success: &StageSuccess,
    ) -> OrchestrationResult<()> {
        self.store
            .append_history(ProcessingAttempt::stage(
                item_id,
                stage,
                true,
                None,
                json!({
                    "resolution": success.resolution.kind(),
                    "payload": success.payload,
                    "attempt": attempt,
                }),
            ))
            .await?;
        Ok(())
    }

    async fn record_stage_failure(
        &self,
        item_id: Uuid,
        stage: PipelineStage,
        attempt: u32,
        classification: &ErrorClassification,
    ) -> OrchestrationResult<()> {
        self.store
            .append_history(ProcessingAttempt::stage(
                item_id,
                stage,
                false,
                Some(classification.message.clone()),
                json!({
                    "category": classification.category,
                    "retryable": classification.retryable,
                    "retry_delay_ms": classification.retry_delay.as_millis() as u64,
                    "attempt": attempt,
                }),
            ))
            .await?;
        Ok(())
    }

    async fn exhaust(
        &self,
        item_id: Uuid,
        from: ProcessingStatus,
        metadata: serde_json::Value,
    ) -> OrchestrationResult<TrackedItem> {
        let item = self
            .machine
            .transition(
                item_id,
                from,
                ProcessingStatus::Exhausted,
                TransitionContext::new().metadata(metadata),
            )
            .await?;
        Ok(item)
    }
}

impl std::fmt::Debug for ItemProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemProcessor")
            .field("executors", &self.executors)
            .field("has_analyzer", &self.analyzer.is_some())
            .finish()
    }
}

/// Entry stage for a processable item.
///
/// A stored human selection resumes identifier lookup regardless of the
/// snapshot; fresh items prefer the cheapest feasible path. Items whose
/// only feasible path is LLM extraction have no entry: the LLM stage is
/// reachable only through content fetch.
fn entry_stage(item: &TrackedItem) -> Option<PipelineStage> {
    if item.status == ProcessingStatus::AwaitingSelection {
        return Some(PipelineStage::Zotero);
    }
    if item.capabilities.identifier_lookup {
        Some(PipelineStage::Zotero)
    } else if item.capabilities.content_fetch {
        Some(PipelineStage::Content)
    } else {
        None
    }
}
