use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states for a tracked item moving through the citation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Initial state, nothing attempted yet
    NotStarted,
    /// Identifier lookup against the bibliographic service is running
    ProcessingZotero,
    /// Page content is being fetched and scanned for identifiers
    ProcessingContent,
    /// Metadata extraction from fetched content is running
    ProcessingLlm,
    /// Candidate identifiers found, an operator must pick one
    AwaitingSelection,
    /// Extracted metadata is waiting for operator review
    AwaitingMetadata,
    /// Linked to an external record with complete metadata
    Stored,
    /// Linked to an external record whose metadata is missing fields
    StoredIncomplete,
    /// Linked to an external record supplied or approved by hand
    StoredCustom,
    /// All automatic processing paths failed
    Exhausted,
    /// Operator chose to skip this item
    Ignored,
    /// Item retired from the active set
    Archived,
}

impl ProcessingStatus {
    /// Check if an automatic pipeline stage is currently running
    pub fn is_active_processing(&self) -> bool {
        matches!(
            self,
            Self::ProcessingZotero | Self::ProcessingContent | Self::ProcessingLlm
        )
    }

    /// Check if the item is blocked on an operator decision
    pub fn requires_user_action(&self) -> bool {
        matches!(self, Self::AwaitingSelection | Self::AwaitingMetadata)
    }

    /// Check if the item is linked to an external record
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored | Self::StoredIncomplete | Self::StoredCustom)
    }

    /// Check if the pipeline will not continue without operator input
    pub fn is_final(&self) -> bool {
        self.is_stored() || matches!(self, Self::Exhausted | Self::Ignored | Self::Archived)
    }

    /// Human-readable label for operator-facing surfaces
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::ProcessingZotero => "Looking up identifiers",
            Self::ProcessingContent => "Fetching content",
            Self::ProcessingLlm => "Extracting metadata",
            Self::AwaitingSelection => "Awaiting identifier selection",
            Self::AwaitingMetadata => "Awaiting metadata review",
            Self::Stored => "Stored",
            Self::StoredIncomplete => "Stored (incomplete)",
            Self::StoredCustom => "Stored (custom)",
            Self::Exhausted => "Attempts exhausted",
            Self::Ignored => "Ignored",
            Self::Archived => "Archived",
        }
    }

    /// The pipeline stage this status executes, if it is an active-processing status
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::ProcessingZotero => Some(PipelineStage::Zotero),
            Self::ProcessingContent => Some(PipelineStage::Content),
            Self::ProcessingLlm => Some(PipelineStage::Llm),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::ProcessingZotero => write!(f, "processing_zotero"),
            Self::ProcessingContent => write!(f, "processing_content"),
            Self::ProcessingLlm => write!(f, "processing_llm"),
            Self::AwaitingSelection => write!(f, "awaiting_selection"),
            Self::AwaitingMetadata => write!(f, "awaiting_metadata"),
            Self::Stored => write!(f, "stored"),
            Self::StoredIncomplete => write!(f, "stored_incomplete"),
            Self::StoredCustom => write!(f, "stored_custom"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Ignored => write!(f, "ignored"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "processing_zotero" => Ok(Self::ProcessingZotero),
            "processing_content" => Ok(Self::ProcessingContent),
            "processing_llm" => Ok(Self::ProcessingLlm),
            "awaiting_selection" => Ok(Self::AwaitingSelection),
            "awaiting_metadata" => Ok(Self::AwaitingMetadata),
            "stored" => Ok(Self::Stored),
            "stored_incomplete" => Ok(Self::StoredIncomplete),
            "stored_custom" => Ok(Self::StoredCustom),
            "exhausted" => Ok(Self::Exhausted),
            "ignored" => Ok(Self::Ignored),
            "archived" => Ok(Self::Archived),
            _ => Err(format!("Invalid processing status: {s}")),
        }
    }
}

/// Default state for newly tracked items
impl Default for ProcessingStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

/// Automatic pipeline stages, in cascade order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Identifier lookup against the bibliographic service
    Zotero,
    /// Content fetch and identifier scan
    Content,
    /// Metadata extraction from fetched content
    Llm,
}

impl PipelineStage {
    /// The active-processing status that runs this stage
    pub fn as_status(&self) -> ProcessingStatus {
        match self {
            Self::Zotero => ProcessingStatus::ProcessingZotero,
            Self::Content => ProcessingStatus::ProcessingContent,
            Self::Llm => ProcessingStatus::ProcessingLlm,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zotero => write!(f, "zotero"),
            Self::Content => write!(f, "content"),
            Self::Llm => write!(f, "llm"),
        }
    }
}

impl std::str::FromStr for PipelineStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zotero" => Ok(Self::Zotero),
            "content" => Ok(Self::Content),
            "llm" => Ok(Self::Llm),
            _ => Err(format!("Invalid pipeline stage: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_class_predicates() {
        assert!(ProcessingStatus::ProcessingZotero.is_active_processing());
        assert!(ProcessingStatus::ProcessingContent.is_active_processing());
        assert!(ProcessingStatus::ProcessingLlm.is_active_processing());
        assert!(!ProcessingStatus::NotStarted.is_active_processing());
        assert!(!ProcessingStatus::AwaitingSelection.is_active_processing());

        assert!(ProcessingStatus::AwaitingSelection.requires_user_action());
        assert!(ProcessingStatus::AwaitingMetadata.requires_user_action());
        assert!(!ProcessingStatus::Stored.requires_user_action());

        assert!(ProcessingStatus::Stored.is_stored());
        assert!(ProcessingStatus::StoredIncomplete.is_stored());
        assert!(ProcessingStatus::StoredCustom.is_stored());
        assert!(!ProcessingStatus::Exhausted.is_stored());
    }

    #[test]
    fn test_final_statuses() {
        for status in [
            ProcessingStatus::Stored,
            ProcessingStatus::StoredIncomplete,
            ProcessingStatus::StoredCustom,
            ProcessingStatus::Exhausted,
            ProcessingStatus::Ignored,
            ProcessingStatus::Archived,
        ] {
            assert!(status.is_final(), "{status} should be final");
        }
        for status in [
            ProcessingStatus::NotStarted,
            ProcessingStatus::ProcessingZotero,
            ProcessingStatus::ProcessingContent,
            ProcessingStatus::ProcessingLlm,
            ProcessingStatus::AwaitingSelection,
            ProcessingStatus::AwaitingMetadata,
        ] {
            assert!(!status.is_final(), "{status} should not be final");
        }
    }

    #[test]
    fn test_status_string_conversion() {
        assert_eq!(
            ProcessingStatus::ProcessingZotero.to_string(),
            "processing_zotero"
        );
        assert_eq!(
            "awaiting_selection".parse::<ProcessingStatus>().unwrap(),
            ProcessingStatus::AwaitingSelection
        );
        assert!("nonsense".parse::<ProcessingStatus>().is_err());
    }

    #[test]
    fn test_status_serde() {
        let status = ProcessingStatus::StoredIncomplete;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"stored_incomplete\"");

        let parsed: ProcessingStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }

    #[test]
    fn test_stage_status_round_trip() {
        for stage in [
            PipelineStage::Zotero,
            PipelineStage::Content,
            PipelineStage::Llm,
        ] {
            assert_eq!(stage.as_status().stage(), Some(stage));
        }
        assert_eq!(ProcessingStatus::Stored.stage(), None);
    }
}
