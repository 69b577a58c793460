//! # System Constants
//!
//! Event names, default tuning values, and status groupings shared across
//! the crate. Runtime configuration (see [`crate::config`]) starts from the
//! defaults declared here.

/// Lifecycle event names published through the event publisher
pub mod events {
    /// A status transition was committed
    pub const ITEM_TRANSITIONED: &str = "item.transitioned";

    /// An item ran out of automatic processing paths and needs an operator
    pub const ITEM_EXHAUSTED: &str = "item.exhausted";

    /// An integrity repair was applied to an item
    pub const ITEM_REPAIRED: &str = "item.repaired";

    /// A batch run began
    pub const BATCH_STARTED: &str = "batch.started";

    /// A batch run finished with all items settled
    pub const BATCH_COMPLETED: &str = "batch.completed";

    /// A batch run was cancelled with items still queued
    pub const BATCH_CANCELLED: &str = "batch.cancelled";

    /// A dedup resolution was applied to a duplicate group
    pub const DEDUP_RESOLUTION_APPLIED: &str = "dedup.resolution_applied";
}

/// Default tuning values, overridable through configuration
pub mod system {
    /// Concurrent per-item pipelines per batch run
    pub const DEFAULT_CONCURRENCY: usize = 5;

    /// First retry delay for network-class failures, in milliseconds
    pub const BACKOFF_BASE_DELAY_MS: u64 = 2_000;

    /// Retry delay ceiling, in milliseconds
    pub const BACKOFF_MAX_DELAY_MS: u64 = 60_000;

    /// Exponential backoff multiplier between attempts
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;

    /// Broadcast channel capacity for lifecycle events
    pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1_000;

    /// Bounded channel capacity for batch progress updates
    pub const DEFAULT_PROGRESS_CHANNEL_CAPACITY: usize = 256;
}

/// Status groupings for iteration; predicates live on the status enum itself
pub mod status_groups {
    use crate::state_machine::states::ProcessingStatus;

    /// Statuses where an automatic pipeline stage is running
    pub const ACTIVE_PROCESSING_STATUSES: &[ProcessingStatus] = &[
        ProcessingStatus::ProcessingZotero,
        ProcessingStatus::ProcessingContent,
        ProcessingStatus::ProcessingLlm,
    ];

    /// Statuses linked to an external record
    pub const STORED_STATUSES: &[ProcessingStatus] = &[
        ProcessingStatus::Stored,
        ProcessingStatus::StoredIncomplete,
        ProcessingStatus::StoredCustom,
    ];

    /// Statuses blocked on an operator decision
    pub const USER_ACTION_STATUSES: &[ProcessingStatus] = &[
        ProcessingStatus::AwaitingSelection,
        ProcessingStatus::AwaitingMetadata,
    ];

    /// Statuses the pipeline will not leave without operator input
    pub const FINAL_STATUSES: &[ProcessingStatus] = &[
        ProcessingStatus::Stored,
        ProcessingStatus::StoredIncomplete,
        ProcessingStatus::StoredCustom,
        ProcessingStatus::Exhausted,
        ProcessingStatus::Ignored,
        ProcessingStatus::Archived,
    ];
}
