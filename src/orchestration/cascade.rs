//! # Cascade Control
//!
//! When a stage fails, the pipeline can automatically fall through to the
//! next cheaper-but-broader stage rather than giving up: identifier lookup
//! falls back to content fetch, content fetch falls back to LLM extraction.
//! LLM extraction is the end of the chain.
//!
//! A cascade is refused when the failure is classified permanent, when the
//! item's owner asked for manual handling only, or when the chain has no
//! next stage. Refusal means the item settles in `exhausted`.

use tracing::debug;

use crate::models::UserIntent;
use crate::orchestration::error_classifier::ErrorClassification;
use crate::state_machine::states::{PipelineStage, ProcessingStatus};

/// Next stage in the fallback chain, if any
pub fn next_stage(stage: PipelineStage) -> Option<PipelineStage> {
    match stage {
        PipelineStage::Zotero => Some(PipelineStage::Content),
        PipelineStage::Content => Some(PipelineStage::Llm),
        PipelineStage::Llm => None,
    }
}

/// Whether a failure in `status` may fall through to the next stage.
///
/// True only when the failure does not block cascading, the owner has not
/// demanded manual handling, and the item is in a stage with a successor.
pub fn should_auto_cascade(
    status: ProcessingStatus,
    classification: &ErrorClassification,
    intent: UserIntent,
) -> bool {
    if classification.blocks_cascade() {
        return false;
    }
    if intent == UserIntent::ManualOnly {
        return false;
    }
    matches!(
        status,
        ProcessingStatus::ProcessingZotero | ProcessingStatus::ProcessingContent
    )
}

/// Verdict on a failed stage, carrying the classification so callers can
/// surface the retry delay
#[derive(Debug, Clone)]
pub enum CascadeDecision {
    /// Continue automatically with the named stage
    Advance {
        to: PipelineStage,
        classification: ErrorClassification,
    },
    /// No automatic path remains; the item settles in `exhausted`
    Exhaust { classification: ErrorClassification },
}

impl CascadeDecision {
    pub fn classification(&self) -> &ErrorClassification {
        match self {
            Self::Advance { classification, .. } | Self::Exhaust { classification } => {
                classification
            }
        }
    }
}

/// Decide what happens after a stage failure in `status`
pub fn decide(
    status: ProcessingStatus,
    classification: ErrorClassification,
    intent: UserIntent,
) -> CascadeDecision {
    if !should_auto_cascade(status, &classification, intent) {
        debug!(
            %status,
            category = %classification.category,
            ?intent,
            "Cascade refused; item will exhaust"
        );
        return CascadeDecision::Exhaust { classification };
    }

    // should_auto_cascade only admits the two statuses below
    let to = match status {
        ProcessingStatus::ProcessingZotero => PipelineStage::Content,
        ProcessingStatus::ProcessingContent => PipelineStage::Llm,
        _ => return CascadeDecision::Exhaust { classification },
    };
    CascadeDecision::Advance { to, classification }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::error_classifier::{ErrorClassifier, HttpStatusError};

    fn network_classification() -> ErrorClassification {
        ErrorClassifier::new().classify(&anyhow::anyhow!("connection timeout"), 1)
    }

    fn permanent_classification() -> ErrorClassification {
        ErrorClassifier::new().classify(&anyhow::anyhow!("unsupported URL scheme"), 1)
    }

    #[test]
    fn test_chain_order() {
        assert_eq!(next_stage(PipelineStage::Zotero), Some(PipelineStage::Content));
        assert_eq!(next_stage(PipelineStage::Content), Some(PipelineStage::Llm));
        assert_eq!(next_stage(PipelineStage::Llm), None);
    }

    #[test]
    fn test_network_failure_in_zotero_advances_to_content() {
        let decision = decide(
            ProcessingStatus::ProcessingZotero,
            network_classification(),
            UserIntent::Auto,
        );
        assert!(matches!(
            decision,
            CascadeDecision::Advance {
                to: PipelineStage::Content,
                ..
            }
        ));
    }

    #[test]
    fn test_client_rejection_in_content_advances_to_llm() {
        let classification =
            ErrorClassifier::new().classify(&anyhow::Error::new(HttpStatusError::new(404, "gone")), 1);
        let decision = decide(
            ProcessingStatus::ProcessingContent,
            classification,
            UserIntent::Auto,
        );
        assert!(matches!(
            decision,
            CascadeDecision::Advance {
                to: PipelineStage::Llm,
                ..
            }
        ));
    }

    #[test]
    fn test_permanent_failure_exhausts() {
        let decision = decide(
            ProcessingStatus::ProcessingZotero,
            permanent_classification(),
            UserIntent::Auto,
        );
        assert!(matches!(decision, CascadeDecision::Exhaust { .. }));
    }

    #[test]
    fn test_manual_only_intent_exhausts_even_for_transient_failures() {
        let decision = decide(
            ProcessingStatus::ProcessingZotero,
            network_classification(),
            UserIntent::ManualOnly,
        );
        assert!(matches!(decision, CascadeDecision::Exhaust { .. }));
    }

    #[test]
    fn test_llm_failures_never_cascade() {
        let decision = decide(
            ProcessingStatus::ProcessingLlm,
            network_classification(),
            UserIntent::Auto,
        );
        assert!(matches!(decision, CascadeDecision::Exhaust { .. }));
    }

    #[test]
    fn test_decision_carries_classification() {
        let decision = decide(
            ProcessingStatus::ProcessingLlm,
            network_classification(),
            UserIntent::Auto,
        );
        assert!(decision.classification().retryable);
        assert!(decision.classification().retry_delay.as_millis() > 0);
    }
}
