//! Core service facade and bootstrap helpers.
//!
//! [`VirtualTouristCore`] wires the host-provided bridges (HTTP, settings,
//! clock) into the store, the Flickr client and the album sync service, and
//! exposes the operations a map/album UI needs. Desktop apps typically
//! enable the `desktop-shims` feature, which supplies a `reqwest` HTTP
//! client and a SQLite settings store.

pub mod error;
pub mod image_cache;
pub mod observer;
pub mod region;

pub use error::{CoreError, Result};
pub use image_cache::ImageCache;
pub use observer::{dispatch_event, spawn_observer, AlbumObserver};
pub use region::MapRegion;

pub use core_runtime::config::{CoreConfig, PhotoSearchConfig};
pub use core_runtime::events::{CoreEvent, EventStream};
pub use core_store::{MergeOutcome, Photo, PhotoId, Pin, PinId};
pub use core_sync::{AlbumState, SyncOutcome};

use bridge_traits::SettingsStore;
use bytes::Bytes;
use core_runtime::events::EventBus;
use core_store::{DatabaseConfig, Store};
use core_sync::AlbumSyncService;
use provider_flickr::FlickrClient;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

/// Primary facade exposed to host applications.
///
/// Cheap to clone; clones share the store, caches and sync state.
#[derive(Clone)]
pub struct VirtualTouristCore {
    store: Store,
    flickr: Arc<FlickrClient>,
    sync: AlbumSyncService,
    settings: Arc<dyn SettingsStore>,
    images: Arc<ImageCache>,
}

impl VirtualTouristCore {
    /// Open the database and wire every component from `config`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Runtime`] if the configuration is invalid
    /// - [`CoreError::Store`] if the database cannot be opened or migrated
    pub async fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let database = if config.database_path.as_os_str() == ":memory:" {
            DatabaseConfig::in_memory()
        } else {
            DatabaseConfig::new(config.database_path.clone())
        };

        let event_bus = EventBus::new(config.event_buffer_size);
        let store = Store::open(database, event_bus.clone(), Arc::clone(&config.clock)).await?;
        let flickr = Arc::new(FlickrClient::new(
            Arc::clone(&config.http_client),
            config.photo_search.clone(),
        ));
        let sync = AlbumSyncService::new(store.clone(), flickr.clone(), event_bus);

        info!(database = %config.database_path.display(), "Virtual Tourist core ready");

        Ok(Self {
            store,
            flickr,
            sync,
            settings: Arc::clone(&config.settings_store),
            images: Arc::new(ImageCache::new(config.image_cache_capacity)),
        })
    }

    // ------------------------------------------------------------------
    // Pins
    // ------------------------------------------------------------------

    /// Long-press began: create the pin at the touch point.
    pub async fn place_pin(&self, latitude: f64, longitude: f64) -> Result<Pin> {
        Ok(self.store.interactive().create_pin(latitude, longitude).await?)
    }

    /// Drag moved: update the pin in place.
    pub async fn move_pin(&self, pin_id: &PinId, latitude: f64, longitude: f64) -> Result<Pin> {
        Ok(self
            .store
            .interactive()
            .update_pin(pin_id, latitude, longitude)
            .await?)
    }

    /// Drag ended: the pin as committed.
    pub async fn finish_pin_drag(&self, pin_id: &PinId) -> Result<Pin> {
        let pin = self.store.interactive().get_pin(pin_id).await?;
        debug!(pin_id = %pin.id, latitude = pin.latitude, longitude = pin.longitude, "Pin drag finished");
        Ok(pin)
    }

    /// Delete a pin with its album. A fetch still running for it commits nothing.
    #[instrument(skip(self, pin_id), fields(pin_id = %pin_id))]
    pub async fn delete_pin(&self, pin_id: &PinId) -> Result<()> {
        let photos = self.store.interactive().list_photos(pin_id).await?;
        self.store.interactive().delete_pin(pin_id).await?;
        self.sync.forget(pin_id).await;
        for photo in &photos {
            self.images.remove(&photo.url_string);
        }
        Ok(())
    }

    /// All pins, newest first, as seen by the interactive context.
    pub async fn list_pins(&self) -> Result<Vec<Pin>> {
        Ok(self.store.interactive().list_pins().await?)
    }

    // ------------------------------------------------------------------
    // Albums
    // ------------------------------------------------------------------

    /// Open a pin's album, fetching photos if it has none.
    ///
    /// Merges background changes so a committed batch is readable through
    /// [`list_photos`](Self::list_photos) right away.
    pub async fn open_album(&self, pin_id: &PinId) -> Result<SyncOutcome> {
        let outcome = self.sync.open_album(pin_id).await;
        self.store.interactive().merge();
        Ok(outcome?)
    }

    /// "New Collection": replace the album with another random page.
    pub async fn refresh_album(&self, pin_id: &PinId) -> Result<SyncOutcome> {
        let outcome = self.sync.refresh_album(pin_id).await;
        self.store.interactive().merge();
        Ok(outcome?)
    }

    pub async fn album_state(&self, pin_id: &PinId) -> AlbumState {
        self.sync.state(pin_id).await
    }

    /// Delete the selected photos; returns how many were removed.
    pub async fn delete_photos(&self, photos: &[Photo]) -> Result<usize> {
        let ids: Vec<PhotoId> = photos.iter().map(|photo| photo.id.clone()).collect();
        let removed = self.store.interactive().delete_photos(&ids).await?;
        for photo in photos {
            self.images.remove(&photo.url_string);
        }
        Ok(removed)
    }

    /// Album of a pin, newest download first.
    pub async fn list_photos(&self, pin_id: &PinId) -> Result<Vec<Photo>> {
        Ok(self.store.interactive().list_photos(pin_id).await?)
    }

    /// Make background commits visible to interactive reads.
    pub fn merge_background_changes(&self) -> MergeOutcome {
        self.store.interactive().merge()
    }

    /// Image bytes for a photo, downloaded on first use.
    pub async fn load_image(&self, photo: &Photo) -> Result<Bytes> {
        if let Some(bytes) = self.images.get(&photo.url_string) {
            return Ok(bytes);
        }

        let bytes = self.flickr.fetch_image(&photo.url_string).await?;
        self.images.insert(photo.url_string.clone(), bytes.clone());
        Ok(bytes)
    }

    // ------------------------------------------------------------------
    // Viewport
    // ------------------------------------------------------------------

    pub async fn save_map_region(&self, map_region: &MapRegion) -> Result<()> {
        region::save_map_region(self.settings.as_ref(), map_region).await
    }

    pub async fn load_map_region(&self) -> Result<Option<MapRegion>> {
        region::load_map_region(self.settings.as_ref()).await
    }

    /// Region to show at startup; stores the default on first launch.
    pub async fn prepare_first_launch(&self) -> Result<MapRegion> {
        region::prepare_first_launch(self.settings.as_ref()).await
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.store.subscribe())
    }

    /// Drive `observer` from the event bus until the core is dropped.
    pub fn attach_observer(&self, observer: Arc<dyn AlbumObserver>) -> JoinHandle<()> {
        spawn_observer(self.store.event_bus(), observer)
    }
}

/// Desktop bootstrap: SQLite files under `data_dir` and the `reqwest` client.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// let core = core_service::bootstrap_desktop("/tmp/virtual-tourist", "flickr-api-key").await?;
/// let region = core.prepare_first_launch().await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    data_dir: impl AsRef<std::path::Path>,
    api_key: impl Into<String>,
) -> Result<VirtualTouristCore> {
    use bridge_desktop::SqliteSettingsStore;

    let data_dir = data_dir.as_ref();
    std::fs::create_dir_all(data_dir)
        .map_err(|e| CoreError::InitializationFailed(format!("{}: {}", data_dir.display(), e)))?;

    let settings = SqliteSettingsStore::new(data_dir.join("settings.db")).await?;
    let config = CoreConfig::builder()
        .database_path(data_dir.join("virtual_tourist.db"))
        .settings_store(Arc::new(settings))
        .photo_search(PhotoSearchConfig::new(api_key))
        .build()?;

    VirtualTouristCore::new(config).await
}
