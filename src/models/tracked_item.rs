use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::state_machine::states::{PipelineStage, ProcessingStatus};

/// Operator-declared handling policy for a tracked item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserIntent {
    /// Normal automatic processing
    Auto,
    /// Skip this item entirely
    Ignore,
    /// Process ahead of other queued items
    Priority,
    /// Operator will handle this item by hand
    ManualOnly,
    /// Retired, keep out of all automatic flows
    Archive,
}

impl UserIntent {
    /// Check if this intent excludes the item from automatic processing
    pub fn blocks_processing(&self) -> bool {
        matches!(self, Self::Ignore | Self::Archive | Self::ManualOnly)
    }
}

impl fmt::Display for UserIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Ignore => write!(f, "ignore"),
            Self::Priority => write!(f, "priority"),
            Self::ManualOnly => write!(f, "manual_only"),
            Self::Archive => write!(f, "archive"),
        }
    }
}

impl std::str::FromStr for UserIntent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "ignore" => Ok(Self::Ignore),
            "priority" => Ok(Self::Priority),
            "manual_only" => Ok(Self::ManualOnly),
            "archive" => Ok(Self::Archive),
            _ => Err(format!("Invalid user intent: {s}")),
        }
    }
}

impl Default for UserIntent {
    fn default() -> Self {
        Self::Auto
    }
}

/// How the current citation link (if any) was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMethod {
    /// Identifier lookup against the bibliographic service
    Zotero,
    /// Content fetch and identifier scan
    Content,
    /// Metadata extraction from fetched content
    Llm,
    /// Supplied or approved by an operator
    Custom,
}

impl ProcessingMethod {
    pub fn from_stage(stage: PipelineStage) -> Self {
        match stage {
            PipelineStage::Zotero => Self::Zotero,
            PipelineStage::Content => Self::Content,
            PipelineStage::Llm => Self::Llm,
        }
    }
}

impl fmt::Display for ProcessingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zotero => write!(f, "zotero"),
            Self::Content => write!(f, "content"),
            Self::Llm => write!(f, "llm"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// Feasibility flags supplied by an external URL analyzer.
///
/// Items are assumed fully processable until an analyzer narrows the paths,
/// so deployments without an analyzer still process everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    /// The bibliographic service can resolve this URL directly
    pub identifier_lookup: bool,
    /// The page content is fetchable for identifier scanning
    pub content_fetch: bool,
    /// Fetched content is suitable for metadata extraction
    pub llm_extraction: bool,
}

impl CapabilitySnapshot {
    pub fn all() -> Self {
        Self {
            identifier_lookup: true,
            content_fetch: true,
            llm_extraction: true,
        }
    }

    pub fn none() -> Self {
        Self {
            identifier_lookup: false,
            content_fetch: false,
            llm_extraction: false,
        }
    }

    /// Check if at least one processing path is feasible
    pub fn has_any(&self) -> bool {
        self.identifier_lookup || self.content_fetch || self.llm_extraction
    }

    /// Check if the given stage is feasible under this snapshot
    pub fn supports(&self, stage: PipelineStage) -> bool {
        match stage {
            PipelineStage::Zotero => self.identifier_lookup,
            PipelineStage::Content => self.content_fetch,
            PipelineStage::Llm => self.llm_extraction,
        }
    }
}

impl Default for CapabilitySnapshot {
    fn default() -> Self {
        Self::all()
    }
}

/// A URL found in source documents, tracked through the citation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedItem {
    pub item_id: Uuid,
    /// The tracked URL as it appeared in the source document
    pub url: String,
    pub status: ProcessingStatus,
    pub user_intent: UserIntent,
    /// Key of the linked external bibliographic record.
    ///
    /// Present exactly when `status` is one of the stored statuses; the
    /// state machine enforces this on every committed transition.
    pub external_key: Option<String>,
    /// The external record was created by this pipeline (not pre-existing)
    pub created_by_core: bool,
    /// The external record has been hand-edited since linking
    pub user_modified_externally: bool,
    /// Number of tracked items referencing the same external key
    pub linked_count: u32,
    /// Count of processing runs against this item
    pub attempts: u32,
    /// Method that produced the current link, if any
    pub last_method: Option<ProcessingMethod>,
    pub capabilities: CapabilitySnapshot,
    /// Free-form fields carried alongside the item (merge target for dedup)
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackedItem {
    /// Create a new tracked item in its initial state
    pub fn new(url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            item_id: Uuid::new_v4(),
            url: url.into(),
            status: ProcessingStatus::default(),
            user_intent: UserIntent::default(),
            external_key: None,
            created_by_core: false,
            user_modified_externally: false,
            linked_count: 0,
            attempts: 0,
            last_method: None,
            capabilities: CapabilitySnapshot::default(),
            metadata: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_external_key(&self) -> bool {
        self.external_key.is_some()
    }
}
