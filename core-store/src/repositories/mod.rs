//! Read-side repositories over the connection pool.
//!
//! Writes do not go through these: they run inside the store's serialized
//! writer so they can share a transaction and publish events in order.

pub mod photo;
pub mod pin;

pub use photo::{PhotoRepository, SqlitePhotoRepository};
pub use pin::{PinRepository, SqlitePinRepository};
