use uuid::Uuid;

use crate::store::StoreError;

/// Errors from duplicate detection and resolution
#[derive(Debug, thiserror::Error)]
pub enum DedupError {
    #[error("Primary item {item_id} of the resolution is missing from the store")]
    PrimaryMissing { item_id: Uuid },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type DedupResult<T> = Result<T, DedupError>;
