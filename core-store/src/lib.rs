//! # Pin & Photo Store
//!
//! Owns the durable SQLite database of pins and their photo albums.
//!
//! ## Overview
//!
//! - SQLite schema and embedded migrations
//! - [`Pin`] / [`Photo`] models with coordinate validation
//! - Read repositories for pins and photos
//! - [`Store`]: one serialized writer shared by two [`StoreContext`]s
//!   (interactive and background), each with its own read cache and an
//!   explicit [`merge`](StoreContext::merge) point
//!
//! Every committed write is published on the core event bus as a
//! [`StoreEvent`](core_runtime::events::StoreEvent), in commit order.

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;
pub mod store;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{Result, StoreError};
pub use models::{Photo, PhotoId, Pin, PinId};
pub use store::{MergeOutcome, ReplaceOutcome, Store, StoreContext};
