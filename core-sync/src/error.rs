use core_store::StoreError;
use provider_flickr::SearchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The photo search failed; the album was left as it was.
    #[error("Photo fetch failed: {0}")]
    Fetch(#[from] SearchError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },
}

impl SyncError {
    /// True when the pin the sync was asked about does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::Store(e) if e.is_not_found())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
