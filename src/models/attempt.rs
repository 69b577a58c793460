use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::state_machine::states::{PipelineStage, ProcessingStatus};

/// What a history entry records: a stage execution or a committed transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptRecord {
    /// A pipeline stage ran against the item
    Stage {
        stage: PipelineStage,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A status transition was committed
    Transition {
        from: ProcessingStatus,
        to: ProcessingStatus,
    },
}

/// Append-only history entry for a tracked item.
///
/// Sequence numbers are assigned by the record store at append time, so
/// concurrent appenders never race on ordering. A freshly constructed
/// attempt carries sequence 0 until the store commits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingAttempt {
    pub item_id: Uuid,
    /// Store-assigned position in the item's history, starting at 1
    pub sequence: u64,
    pub occurred_at: DateTime<Utc>,
    pub record: AttemptRecord,
    /// Context captured at commit time (trigger, error details, repair flags)
    #[serde(default)]
    pub metadata: Value,
}

impl ProcessingAttempt {
    /// Record a pipeline stage execution
    pub fn stage(
        item_id: Uuid,
        stage: PipelineStage,
        success: bool,
        error: Option<String>,
        metadata: Value,
    ) -> Self {
        Self {
            item_id,
            sequence: 0,
            occurred_at: Utc::now(),
            record: AttemptRecord::Stage {
                stage,
                success,
                error,
            },
            metadata,
        }
    }

    /// Record a committed status transition
    pub fn transition(
        item_id: Uuid,
        from: ProcessingStatus,
        to: ProcessingStatus,
        metadata: Value,
    ) -> Self {
        Self {
            item_id,
            sequence: 0,
            occurred_at: Utc::now(),
            record: AttemptRecord::Transition { from, to },
            metadata,
        }
    }

    /// Check if this entry was appended by an integrity repair
    pub fn is_integrity_repair(&self) -> bool {
        self.metadata
            .get("integrity_repair")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
