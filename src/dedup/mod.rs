//! # URL Deduplication
//!
//! Multiple tracked items often point at the same resource through
//! cosmetically different URLs. This module finds those groups and merges
//! them down to one surviving item:
//!
//! - [`normalizer`]: canonical dedup keys from conservative URL rewriting
//! - [`detector`]: store-wide scan producing [`DuplicateGroup`]s
//! - [`resolver`]: merge decisions, default proposals, and safe application
//!
//! Groups are computed at detection time and never persisted. Destructive
//! steps run behind the same guards operators face, and anything refused is
//! reported rather than silently dropped.

pub mod detector;
pub mod errors;
pub mod normalizer;
pub mod resolver;

pub use detector::{DuplicateDetector, DuplicateGroup};
pub use errors::{DedupError, DedupResult};
pub use normalizer::{StandardUrlNormalizer, UrlNormalizer};
pub use resolver::{
    default_resolution, DedupResolver, ExternalRecordGateway, GroupResolution,
    ResolutionDecision, ResolutionOutcome, SkippedAction,
};
