//! # Core Configuration Module
//!
//! Builder-based configuration for the Virtual Tourist core.
//!
//! ## Overview
//!
//! [`CoreConfig`] holds the injected host capabilities (HTTP, settings, clock)
//! and the tunables of the photo search. The builder fails fast with an
//! actionable message when a required piece is missing.
//!
//! ## Required
//!
//! - `database_path` - SQLite file holding pins and photos
//! - `SettingsStore` - Viewport and first-launch persistence
//! - `PhotoSearchConfig` with a non-empty API key
//!
//! ## Optional (with defaults)
//!
//! - `HttpClient` - desktop default: reqwest (`desktop-shims` feature)
//! - `Clock` - system clock
//! - event buffer size, image cache capacity
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, PhotoSearchConfig};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/virtual_tourist.db")
//!     .http_client(Arc::new(MyHttpClient))
//!     .settings_store(Arc::new(MySettingsStore))
//!     .photo_search(PhotoSearchConfig::new("flickr-api-key"))
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, HttpClient, SettingsStore, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default Flickr REST endpoint.
pub const DEFAULT_PHOTO_API_URL: &str = "https://api.flickr.com/services/rest/";

/// Default number of decoded-ready image payloads kept in memory.
pub const DEFAULT_IMAGE_CACHE_CAPACITY: usize = 64;

/// Largest page size the search API accepts.
pub const MAX_PER_PAGE: u32 = 500;

/// Photo search API configuration.
///
/// The bounding box searched around a pin is `2 * bbox_half_width` degrees
/// of longitude by `2 * bbox_half_height` degrees of latitude, clamped to
/// valid coordinates.
#[derive(Clone, PartialEq)]
pub struct PhotoSearchConfig {
    /// Static API credential
    pub api_key: String,
    /// REST endpoint
    pub base_url: String,
    /// Remote method name
    pub method: String,
    /// Results requested per page
    pub per_page: u32,
    /// Half of the bounding box width, in degrees of longitude
    pub bbox_half_width: f64,
    /// Half of the bounding box height, in degrees of latitude
    pub bbox_half_height: f64,
    /// Deepest result index the API lets us page to
    pub max_results_cap: u32,
    /// Safe search level sent with every query
    pub safe_search: u8,
    /// Extra fields requested; must include the medium URL field
    pub extras: String,
    /// Response format
    pub format: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl PhotoSearchConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_PHOTO_API_URL.to_string(),
            method: "flickr.photos.search".to_string(),
            per_page: 21,
            bbox_half_width: 1.0,
            bbox_half_height: 1.0,
            max_results_cap: 4000,
            safe_search: 1,
            extras: "url_m".to_string(),
            format: "json".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn with_bbox_half_size(mut self, half_width: f64, half_height: f64) -> Self {
        self.bbox_half_width = half_width;
        self.bbox_half_height = half_height;
        self
    }

    pub fn with_max_results_cap(mut self, cap: u32) -> Self {
        self.max_results_cap = cap;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("Photo search API key cannot be empty".to_string()));
        }

        if self.base_url.trim().is_empty() {
            return Err(Error::Config("Photo search base URL cannot be empty".to_string()));
        }

        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            return Err(Error::Config(format!(
                "per_page must be between 1 and {}",
                MAX_PER_PAGE
            )));
        }

        for (name, value) in [
            ("bbox_half_width", self.bbox_half_width),
            ("bbox_half_height", self.bbox_half_height),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::Config(format!(
                    "{} must be a positive number of degrees",
                    name
                )));
            }
        }

        if self.max_results_cap < self.per_page {
            return Err(Error::Config(
                "max_results_cap must be at least one page of results".to_string(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for PhotoSearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoSearchConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("method", &self.method)
            .field("per_page", &self.per_page)
            .field("bbox_half_width", &self.bbox_half_width)
            .field("bbox_half_height", &self.bbox_half_height)
            .field("max_results_cap", &self.max_results_cap)
            .field("safe_search", &self.safe_search)
            .field("extras", &self.extras)
            .finish()
    }
}

/// Core configuration for the Virtual Tourist core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// HTTP client used for searches and image downloads
    pub http_client: Arc<dyn HttpClient>,

    /// Preferences storage (required)
    pub settings_store: Arc<dyn SettingsStore>,

    /// Time source for creation and download dates
    pub clock: Arc<dyn Clock>,

    /// Buffered events per subscriber before it lags
    pub event_buffer_size: usize,

    /// In-memory image payloads kept by the service
    pub image_cache_capacity: usize,

    /// Photo search API settings
    pub photo_search: PhotoSearchConfig,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("http_client", &"HttpClient { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("clock", &"Clock { ... }")
            .field("event_buffer_size", &self.event_buffer_size)
            .field("image_cache_capacity", &self.image_cache_capacity)
            .field("photo_search", &self.photo_search)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.image_cache_capacity == 0 {
            return Err(Error::Config(
                "Image cache capacity must be greater than 0".to_string(),
            ));
        }

        self.photo_search.validate()
    }
}

fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required for viewport persistence. \
                 Desktop: use bridge_desktop::SqliteSettingsStore. \
                 Mobile: inject platform-native settings (UserDefaults/DataStore)."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new()?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                 Desktop: enable the 'desktop-shims' feature. \
                 Mobile: inject platform-native adapter."
            .to_string(),
    })
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
    image_cache_capacity: Option<usize>,
    photo_search: Option<PhotoSearchConfig>,
}

impl CoreConfigBuilder {
    /// Sets the database path.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .database_path("/path/to/virtual_tourist.db");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Default: [`DEFAULT_EVENT_BUFFER_SIZE`]
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Default: [`DEFAULT_IMAGE_CACHE_CAPACITY`]
    pub fn image_cache_capacity(mut self, capacity: usize) -> Self {
        self.image_cache_capacity = Some(capacity);
        self
    }

    pub fn photo_search(mut self, config: PhotoSearchConfig) -> Self {
        self.photo_search = Some(config);
        self
    }

    /// Builds the final configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when a required field is missing or a value is invalid
    /// - [`Error::CapabilityMissing`] when a required bridge has no implementation
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let photo_search = self.photo_search.ok_or_else(|| {
            Error::Config(
                "Photo search configuration is required. Use .photo_search() to set it."
                    .to_string(),
            )
        })?;

        let settings_store = self.settings_store.ok_or_else(settings_store_missing_error)?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let config = CoreConfig {
            database_path,
            http_client,
            settings_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            image_cache_capacity: self
                .image_cache_capacity
                .unwrap_or(DEFAULT_IMAGE_CACHE_CAPACITY),
            photo_search,
        };

        config.validate()?;

        Ok(config)
    }
}
