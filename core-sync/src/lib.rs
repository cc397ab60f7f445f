//! # Album Sync
//!
//! Fills and refreshes pin albums from the photo search provider.
//!
//! ## Components
//!
//! - **Album State Machine** (`state`): per-pin `Idle → Fetching → Committed | Failed`
//!   with validated transitions
//! - **Album Sync Service** (`service`): trigger rules, single-flight per pin,
//!   atomic commit through the store's background context

pub mod error;
pub mod service;
pub mod state;

pub use error::{Result, SyncError};
pub use service::AlbumSyncService;
pub use state::{AlbumState, SyncOutcome};
