//! # State Machine
//!
//! Status lifecycle for tracked items: the canonical transition table,
//! pure guard predicates, integrity rules with deterministic repairs, and
//! the commit engine that ties them together.
//!
//! ## Architecture
//!
//! - **States** ([`states`]): the twelve-status enum and its class
//!   predicates, plus the pipeline stage enum.
//! - **Transitions** ([`transitions`]): the single authoritative table of
//!   legal status changes.
//! - **Guards** ([`guards`]): pure predicates gating operator and pipeline
//!   actions; never mutate state.
//! - **Integrity** ([`integrity`]): at-rest invariants, violation detection,
//!   and repair proposals.
//! - **Machine** ([`machine`]): validates, persists atomically, appends
//!   history, dispatches side-effect hooks.
//! - **Actions** ([`actions`]): post-commit side effects (logging, event
//!   publication, exhaustion alerts) that swallow their own failures.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use citeline_core::events::EventPublisher;
//! use citeline_core::state_machine::{ProcessingStatus, StatusMachine, TransitionContext};
//! use citeline_core::store::InMemoryRecordStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryRecordStore::new());
//! let machine = StatusMachine::new(store, EventPublisher::default());
//!
//! let item_id = uuid::Uuid::new_v4();
//! let item = machine
//!     .transition(
//!         item_id,
//!         ProcessingStatus::NotStarted,
//!         ProcessingStatus::ProcessingZotero,
//!         TransitionContext::triggered_by("operator"),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod errors;
pub mod guards;
pub mod integrity;
pub mod machine;
pub mod states;
pub mod transitions;

// Re-export the working surface
pub use actions::{ActionError, TransitionAction, TransitionHooks};
pub use errors::{GuardError, GuardResult, StateMachineError, StateMachineResult};
pub use guards::{available_actions, evaluate, ItemAction, ACTION_PRIORITY};
pub use integrity::{
    integrity_issues, is_consistent, suggest_repair, IntegrityIssue, RepairAction, RepairProposal,
};
pub use machine::{AppliedRepair, StatusMachine, TransitionContext};
pub use states::{PipelineStage, ProcessingStatus};
pub use transitions::{can_transition, possible_next_states, ALL_STATUSES};
