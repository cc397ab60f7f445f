//! Per-pin album fetch state machine
//!
//! ```text
//!        ┌──────────── trigger ────────────┐
//!        v                                 │
//!  Idle ──> Fetching ──> Committed ────────┤
//!              │                           │
//!              └──────> Failed ────────────┘
//! ```
//!
//! `Committed` and `Failed` are resting states; the next trigger moves them
//! straight back to `Fetching`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SyncError};

/// Fetch state of one pin's album.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AlbumState {
    /// Never fetched, or forgotten
    #[default]
    Idle,
    /// A search is in flight
    Fetching,
    /// The last fetch replaced the album
    Committed { photo_count: usize },
    /// The last fetch failed; the album kept its previous photos
    Failed { message: String },
}

impl AlbumState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlbumState::Idle => "idle",
            AlbumState::Fetching => "fetching",
            AlbumState::Committed { .. } => "committed",
            AlbumState::Failed { .. } => "failed",
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, AlbumState::Fetching)
    }

    /// Enter `Fetching`.
    ///
    /// # Errors
    ///
    /// Returns an error if a fetch is already in flight
    pub fn start_fetch(&self) -> Result<AlbumState> {
        self.transition(AlbumState::Fetching)
    }

    /// Record a committed batch.
    ///
    /// # Errors
    ///
    /// Returns an error unless the state is `Fetching`
    pub fn commit(&self, photo_count: usize) -> Result<AlbumState> {
        self.transition(AlbumState::Committed { photo_count })
    }

    /// Record a failed fetch.
    ///
    /// # Errors
    ///
    /// Returns an error unless the state is `Fetching`
    pub fn fail(&self, message: impl Into<String>) -> Result<AlbumState> {
        self.transition(AlbumState::Failed {
            message: message.into(),
        })
    }

    fn transition(&self, to: AlbumState) -> Result<AlbumState> {
        let valid = match (self, &to) {
            (AlbumState::Fetching, AlbumState::Fetching) => false,
            (_, AlbumState::Fetching) => true,

            (AlbumState::Fetching, AlbumState::Committed { .. }) => true,
            (AlbumState::Fetching, AlbumState::Failed { .. }) => true,

            _ => false,
        };

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!("Cannot transition from {} to {}", self, to.as_str()),
            });
        }

        Ok(to)
    }
}

impl fmt::Display for AlbumState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a sync trigger that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Album already had photos; nothing fetched
    AlreadyPopulated { photo_count: usize },
    /// Another fetch for this pin is running; this trigger was ignored
    AlreadyInFlight,
    /// A new batch replaced the album. Zero means the area has no photos.
    Committed { photo_count: usize },
    /// The pin was deleted while the fetch ran; nothing was written
    PinDeleted,
}
