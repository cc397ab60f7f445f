use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Store error: {0}")]
    Store(#[from] core_store::StoreError),

    #[error("Photo search error: {0}")]
    Search(#[from] provider_flickr::SearchError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Settings error: {0}")]
    Settings(#[from] bridge_traits::BridgeError),
}

impl CoreError {
    /// True when the pin or photo an operation targeted no longer exists.
    pub fn is_not_found(&self) -> bool {
        match self {
            CoreError::Store(e) => e.is_not_found(),
            CoreError::Sync(e) => e.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
