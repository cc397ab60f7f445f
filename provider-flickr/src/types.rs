//! Photo search API response types
//!
//! Every field is optional at the serde level so a missing key is reported
//! as a named [`SearchError::Parse`] instead of a generic serde message.

use serde::Deserialize;

use crate::error::{Result, SearchError};

/// Envelope of a `flickr.photos.search` JSON response.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    /// `"ok"` or `"fail"`
    pub stat: Option<String>,

    /// Set when `stat` is `"fail"`
    #[serde(default)]
    pub code: Option<i64>,

    /// Set when `stat` is `"fail"`
    #[serde(default)]
    pub message: Option<String>,

    pub photos: Option<RawPhotosPage>,
}

#[derive(Debug, Deserialize)]
pub struct RawPhotosPage {
    pub page: Option<u32>,
    pub pages: Option<u32>,
    pub photo: Option<Vec<PhotoItem>>,
}

/// One search result. Only the medium image URL is used.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoItem {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    /// Medium-size image URL, present when `extras=url_m` was requested
    #[serde(default)]
    pub url_m: Option<String>,
}

/// A validated result page.
#[derive(Debug, Clone)]
pub struct PhotosPage {
    pub pages: u32,
    pub photos: Vec<PhotoItem>,
}

impl PhotosPage {
    /// Medium URLs in response order; items without one are skipped.
    pub fn urls(&self) -> Vec<String> {
        self.photos
            .iter()
            .filter_map(|item| item.url_m.clone())
            .collect()
    }
}

impl SearchResponse {
    /// Parse a response body and check its `stat` and shape.
    pub fn parse(body: &[u8]) -> Result<PhotosPage> {
        let response: SearchResponse = serde_json::from_slice(body)
            .map_err(|e| SearchError::Parse(format!("invalid JSON: {}", e)))?;
        response.into_page()
    }

    fn into_page(self) -> Result<PhotosPage> {
        match self.stat.as_deref() {
            Some("ok") => {}
            Some(_) => {
                let message = match (self.code, self.message) {
                    (Some(code), Some(message)) => format!("{} (code {})", message, code),
                    (None, Some(message)) => message,
                    (Some(code), None) => format!("code {}", code),
                    (None, None) => "request failed".to_string(),
                };
                return Err(SearchError::Api { message });
            }
            None => return Err(SearchError::missing_key("stat")),
        }

        let photos = self.photos.ok_or_else(|| SearchError::missing_key("photos"))?;
        let pages = photos.pages.ok_or_else(|| SearchError::missing_key("pages"))?;
        let items = photos.photo.ok_or_else(|| SearchError::missing_key("photo"))?;

        Ok(PhotosPage {
            pages,
            photos: items,
        })
    }
}
