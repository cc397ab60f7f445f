//! # Flickr Photo Search Provider
//!
//! Finds photos taken near a coordinate through the Flickr REST API.
//!
//! ## Overview
//!
//! - [`PhotoSearch`]: the seam the album sync service depends on
//! - [`FlickrClient`]: bounding box query, random result page, flat list
//!   of medium-size image URLs
//! - Distinct errors for transport, HTTP status, parse and API failures
//!
//! The client holds no persistence knowledge and never retries.

pub mod bbox;
pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;

pub use bbox::BoundingBox;
pub use client::FlickrClient;
pub use error::{Result, SearchError};

/// Location-based photo search.
#[async_trait]
pub trait PhotoSearch: Send + Sync {
    /// Medium-size image URLs of one result page near `(latitude, longitude)`,
    /// in API response order.
    ///
    /// An area with no photos is `Ok(vec![])`, not an error.
    async fn search_by_location(&self, latitude: f64, longitude: f64) -> Result<Vec<String>>;
}
