//! # Core Models
//!
//! Data types for tracked items and their append-only processing history.
//!
//! A [`TrackedItem`] is a URL found in source documents, carried through the
//! pipeline by the state machine. Every stage execution and every committed
//! transition appends a [`ProcessingAttempt`] to the item's history.

pub mod attempt;
pub mod tracked_item;

// Re-export core models for easy access
pub use attempt::{AttemptRecord, ProcessingAttempt};
pub use tracked_item::{CapabilitySnapshot, ProcessingMethod, TrackedItem, UserIntent};
