//! # Serialized Writer and Writer Contexts
//!
//! [`Store`] owns the pool, a single write lock and the event bus. Callers
//! never write through the `Store` directly; they take a [`StoreContext`]:
//!
//! - [`Store::interactive`] for foreground edits (place, move, delete pins,
//!   delete selected photos)
//! - [`Store::background`] for album fetch commits
//!
//! ```text
//!  interactive ──┐                        ┌──> interactive cache (own writes: now)
//!                ├──> write lock ──> SQLite ──> event bus (commit order)
//!  background ───┘                        └──> other cache (pending until merge)
//! ```
//!
//! Every write is one SQLite statement or one transaction, so it either
//! fully applies or leaves nothing behind. Events are emitted after commit
//! and before the write lock is released.
//!
//! Each context caches what it has read. A write through one context is
//! visible to that context's reads immediately and to the other context's
//! cached reads only after [`StoreContext::merge`]. Data a context has
//! never read is loaded from the database on first access.

mod cache;

use crate::db::{create_pool, DatabaseConfig};
use crate::error::{Result, StoreError};
use crate::models::{validate_coordinates, Photo, PhotoId, Pin, PinId};
use crate::repositories::{
    PhotoRepository, PinRepository, SqlitePhotoRepository, SqlitePinRepository,
};
use bridge_traits::Clock;
use cache::{ContextCache, Invalidation};
use core_runtime::events::{
    ChangeKind, CoreEvent, EntityChange, EntityKind, EventBus, Receiver, StoreEvent, WriterContext,
};
use sqlx::{query, query_as, query_scalar, SqlitePool};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

/// Result of [`StoreContext::replace_photos`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The album now holds exactly the new batch.
    Replaced { photo_count: usize },
    /// The pin was deleted before the batch arrived; nothing was written.
    PinMissing,
}

/// What a [`StoreContext::merge`] made visible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub pins_changed: bool,
    pub albums_changed: Vec<PinId>,
}

impl MergeOutcome {
    pub fn is_empty(&self) -> bool {
        !self.pins_changed && self.albums_changed.is_empty()
    }
}

struct StoreInner {
    pool: SqlitePool,
    pins: SqlitePinRepository,
    photos: SqlitePhotoRepository,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    write_lock: tokio::sync::Mutex<()>,
    interactive: Mutex<ContextCache>,
    background: Mutex<ContextCache>,
}

fn change(
    kind: ChangeKind,
    entity: EntityKind,
    id: &impl ToString,
    pin_id: &PinId,
    origin: WriterContext,
    cascade: bool,
) -> StoreEvent {
    StoreEvent::Changed(EntityChange {
        kind,
        entity,
        id: id.to_string(),
        pin_id: pin_id.to_string(),
        origin,
        cascade,
    })
}

fn invalid_coordinates(message: String) -> StoreError {
    StoreError::InvalidInput {
        field: "coordinates".to_string(),
        message,
    }
}

impl StoreInner {
    fn cache(&self, context: WriterContext) -> MutexGuard<'_, ContextCache> {
        let cache = match context {
            WriterContext::Interactive => &self.interactive,
            WriterContext::Background => &self.background,
        };
        cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Call after commit with the write lock held.
    fn publish(&self, origin: WriterContext, invalidation: Invalidation, events: Vec<StoreEvent>) {
        self.cache(origin).apply(&invalidation);
        self.cache(origin.other()).defer(invalidation);

        for event in events {
            self.event_bus.emit(CoreEvent::Store(event)).ok();
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    async fn create_pin(&self, origin: WriterContext, latitude: f64, longitude: f64) -> Result<Pin> {
        validate_coordinates(latitude, longitude).map_err(invalid_coordinates)?;

        let _guard = self.write_lock.lock().await;
        let pin = Pin::new(latitude, longitude, self.clock.unix_timestamp_millis());

        query("INSERT INTO pins (id, latitude, longitude, creation_date) VALUES (?, ?, ?, ?)")
            .bind(&pin.id)
            .bind(pin.latitude)
            .bind(pin.longitude)
            .bind(pin.creation_date)
            .execute(&self.pool)
            .await
            .map_err(StoreError::write)?;

        self.publish(
            origin,
            Invalidation::pins(),
            vec![change(ChangeKind::Insert, EntityKind::Pin, &pin.id, &pin.id, origin, false)],
        );

        debug!(pin_id = %pin.id, "Pin created");
        Ok(pin)
    }

    async fn update_pin(
        &self,
        origin: WriterContext,
        id: &PinId,
        latitude: f64,
        longitude: f64,
    ) -> Result<Pin> {
        validate_coordinates(latitude, longitude).map_err(invalid_coordinates)?;

        let _guard = self.write_lock.lock().await;

        let pin = query_as::<_, Pin>(
            "UPDATE pins SET latitude = ?, longitude = ? WHERE id = ? \
             RETURNING id, latitude, longitude, creation_date",
        )
        .bind(latitude)
        .bind(longitude)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::write)?
        .ok_or_else(|| StoreError::pin_not_found(id))?;

        self.publish(
            origin,
            Invalidation::pins(),
            vec![change(ChangeKind::Update, EntityKind::Pin, &pin.id, &pin.id, origin, false)],
        );

        Ok(pin)
    }

    async fn delete_pin(&self, origin: WriterContext, id: &PinId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(StoreError::write)?;

        let photo_ids = query_scalar::<_, PhotoId>(
            "SELECT id FROM photos WHERE pin_id = ? ORDER BY position",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(StoreError::write)?;

        query("DELETE FROM photos WHERE pin_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::write)?;

        let deleted = query("DELETE FROM pins WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::write)?
            .rows_affected();

        if deleted == 0 {
            // Dropping the transaction rolls it back
            return Err(StoreError::pin_not_found(id));
        }

        tx.commit().await.map_err(StoreError::write)?;

        let mut events: Vec<StoreEvent> = photo_ids
            .iter()
            .map(|photo_id| change(ChangeKind::Delete, EntityKind::Photo, photo_id, id, origin, true))
            .collect();
        events.push(change(ChangeKind::Delete, EntityKind::Pin, id, id, origin, false));

        self.publish(origin, Invalidation::pins().with_album(id.clone()), events);

        info!(pin_id = %id, photos_removed = photo_ids.len(), "Pin deleted");
        Ok(())
    }

    async fn replace_photos(
        &self,
        origin: WriterContext,
        pin_id: &PinId,
        urls: &[String],
    ) -> Result<ReplaceOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(StoreError::write)?;

        let exists = query("SELECT 1 FROM pins WHERE id = ?")
            .bind(pin_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::write)?
            .is_some();

        if !exists {
            debug!(pin_id = %pin_id, "Pin gone before album commit; dropping batch");
            return Ok(ReplaceOutcome::PinMissing);
        }

        let old_ids = query_scalar::<_, PhotoId>(
            "SELECT id FROM photos WHERE pin_id = ? ORDER BY position",
        )
        .bind(pin_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(StoreError::write)?;

        query("DELETE FROM photos WHERE pin_id = ?")
            .bind(pin_id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::write)?;

        let download_date = self.clock.unix_timestamp_millis();
        let mut new_photos = Vec::with_capacity(urls.len());

        for (position, url) in urls.iter().enumerate() {
            let photo = Photo::new(pin_id.clone(), url.as_str(), download_date, position as i64);

            query(
                "INSERT INTO photos (id, pin_id, url_string, download_date, position) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&photo.id)
            .bind(&photo.pin_id)
            .bind(&photo.url_string)
            .bind(photo.download_date)
            .bind(photo.position)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::write)?;

            new_photos.push(photo);
        }

        tx.commit().await.map_err(StoreError::write)?;

        let mut events: Vec<StoreEvent> = old_ids
            .iter()
            .map(|photo_id| {
                change(ChangeKind::Delete, EntityKind::Photo, photo_id, pin_id, origin, true)
            })
            .collect();
        events.extend(new_photos.iter().map(|photo| {
            change(ChangeKind::Insert, EntityKind::Photo, &photo.id, pin_id, origin, true)
        }));
        events.push(StoreEvent::PhotosReplaced {
            pin_id: pin_id.to_string(),
            photo_count: new_photos.len(),
            origin,
        });

        self.publish(origin, Invalidation::album(pin_id.clone()), events);

        info!(
            pin_id = %pin_id,
            removed = old_ids.len(),
            inserted = new_photos.len(),
            "Album replaced"
        );
        Ok(ReplaceOutcome::Replaced {
            photo_count: new_photos.len(),
        })
    }

    async fn delete_photos(&self, origin: WriterContext, ids: &[PhotoId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(StoreError::write)?;
        let mut removed: Vec<(PhotoId, PinId)> = Vec::with_capacity(ids.len());

        for id in ids {
            let owner = query_scalar::<_, PinId>("DELETE FROM photos WHERE id = ? RETURNING pin_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(StoreError::write)?;

            if let Some(pin_id) = owner {
                removed.push((id.clone(), pin_id));
            }
        }

        tx.commit().await.map_err(StoreError::write)?;

        if removed.is_empty() {
            return Ok(0);
        }

        let invalidation = removed
            .iter()
            .fold(Invalidation::default(), |acc, (_, pin_id)| acc.with_album(pin_id.clone()));
        let events = removed
            .iter()
            .map(|(photo_id, pin_id)| {
                change(ChangeKind::Delete, EntityKind::Photo, photo_id, pin_id, origin, false)
            })
            .collect();

        self.publish(origin, invalidation, events);

        debug!(requested = ids.len(), removed = removed.len(), "Photos deleted");
        Ok(removed.len())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    async fn list_pins(&self, context: WriterContext) -> Result<Vec<Pin>> {
        let generation = {
            let cache = self.cache(context);
            if let Some(pins) = cache.pins() {
                return Ok(pins.to_vec());
            }
            cache.generation()
        };

        let pins = self.pins.list_newest_first().await?;
        self.cache(context).store_pins(generation, pins.clone());
        Ok(pins)
    }

    async fn get_pin(&self, context: WriterContext, id: &PinId) -> Result<Pin> {
        {
            let cache = self.cache(context);
            if let Some(pins) = cache.pins() {
                return pins
                    .iter()
                    .find(|pin| &pin.id == id)
                    .cloned()
                    .ok_or_else(|| StoreError::pin_not_found(id));
            }
        }

        self.pins
            .find_by_id(id)
            .await?
            .ok_or_else(|| StoreError::pin_not_found(id))
    }

    async fn list_photos(&self, context: WriterContext, pin_id: &PinId) -> Result<Vec<Photo>> {
        let generation = {
            let cache = self.cache(context);
            if let Some(photos) = cache.album(pin_id) {
                return Ok(photos.to_vec());
            }
            cache.generation()
        };

        let photos = self.photos.find_by_pin(pin_id).await?;
        self.cache(context)
            .store_album(generation, pin_id.clone(), photos.clone());
        Ok(photos)
    }
}

/// Durable pin and photo store.
///
/// Cheap to clone; clones share the pool, the writer and both contexts.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Wrap an already migrated pool.
    pub fn new(pool: SqlitePool, event_bus: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                pins: SqlitePinRepository::new(pool.clone()),
                photos: SqlitePhotoRepository::new(pool.clone()),
                pool,
                event_bus,
                clock,
                write_lock: tokio::sync::Mutex::new(()),
                interactive: Mutex::new(ContextCache::default()),
                background: Mutex::new(ContextCache::default()),
            }),
        }
    }

    /// Open (and migrate) the database described by `config`.
    pub async fn open(
        config: DatabaseConfig,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let pool = create_pool(config).await?;
        Ok(Self::new(pool, event_bus, clock))
    }

    /// Context for foreground edits.
    pub fn interactive(&self) -> StoreContext {
        self.context(WriterContext::Interactive)
    }

    /// Context for background fetch commits.
    pub fn background(&self) -> StoreContext {
        self.context(WriterContext::Background)
    }

    pub fn context(&self, kind: WriterContext) -> StoreContext {
        StoreContext {
            inner: Arc::clone(&self.inner),
            kind,
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    /// Subscribe to committed changes. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.inner.event_bus.subscribe()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("event_bus", &self.inner.event_bus)
            .finish_non_exhaustive()
    }
}

/// Handle for reading and writing through one writer context.
#[derive(Clone)]
pub struct StoreContext {
    inner: Arc<StoreInner>,
    kind: WriterContext,
}

impl StoreContext {
    pub fn kind(&self) -> WriterContext {
        self.kind
    }

    /// Create a pin with a fresh id and creation date.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidInput`] for out-of-range coordinates,
    /// [`StoreError::Write`] if the insert fails.
    #[instrument(skip(self), fields(context = %self.kind))]
    pub async fn create_pin(&self, latitude: f64, longitude: f64) -> Result<Pin> {
        self.inner.create_pin(self.kind, latitude, longitude).await
    }

    /// Move a pin in place. Id and creation date are unchanged.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the pin no longer exists.
    #[instrument(skip(self, id), fields(context = %self.kind, pin_id = %id))]
    pub async fn update_pin(&self, id: &PinId, latitude: f64, longitude: f64) -> Result<Pin> {
        self.inner.update_pin(self.kind, id, latitude, longitude).await
    }

    /// Delete a pin and its whole album in one transaction.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the pin no longer exists.
    #[instrument(skip(self, id), fields(context = %self.kind, pin_id = %id))]
    pub async fn delete_pin(&self, id: &PinId) -> Result<()> {
        self.inner.delete_pin(self.kind, id).await
    }

    /// Fetch one pin.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the pin does not exist as seen by this context.
    pub async fn get_pin(&self, id: &PinId) -> Result<Pin> {
        self.inner.get_pin(self.kind, id).await
    }

    /// All pins, newest first.
    pub async fn list_pins(&self) -> Result<Vec<Pin>> {
        self.inner.list_pins(self.kind).await
    }

    /// Swap a pin's album for `urls` in one transaction.
    ///
    /// Readers see either the old album or the new one. A pin deleted in the
    /// meantime yields [`ReplaceOutcome::PinMissing`] and writes nothing.
    #[instrument(skip(self, pin_id, urls), fields(context = %self.kind, pin_id = %pin_id, photo_count = urls.len()))]
    pub async fn replace_photos(&self, pin_id: &PinId, urls: &[String]) -> Result<ReplaceOutcome> {
        self.inner.replace_photos(self.kind, pin_id, urls).await
    }

    /// Delete specific photos; ids that no longer exist are skipped.
    ///
    /// Returns how many photos were removed.
    #[instrument(skip(self, ids), fields(context = %self.kind, requested = ids.len()))]
    pub async fn delete_photos(&self, ids: &[PhotoId]) -> Result<usize> {
        self.inner.delete_photos(self.kind, ids).await
    }

    /// Album of a pin, newest download first. Empty for an unknown pin.
    pub async fn list_photos(&self, pin_id: &PinId) -> Result<Vec<Photo>> {
        self.inner.list_photos(self.kind, pin_id).await
    }

    /// Apply writes made through the other context since the last merge.
    pub fn merge(&self) -> MergeOutcome {
        let merged = self.inner.cache(self.kind).merge_pending();
        let mut albums_changed: Vec<PinId> = merged.albums.into_iter().collect();
        albums_changed.sort();

        if merged.pins || !albums_changed.is_empty() {
            debug!(
                context = %self.kind,
                pins_changed = merged.pins,
                albums_changed = albums_changed.len(),
                "Merged changes from other context"
            );
        }

        MergeOutcome {
            pins_changed: merged.pins,
            albums_changed,
        }
    }

    /// Drop everything this context has cached, pending or not.
    pub fn refresh(&self) {
        self.inner.cache(self.kind).clear();
    }

    /// True when the other context wrote something this one has not merged.
    pub fn has_pending_changes(&self) -> bool {
        self.inner.cache(self.kind).has_pending()
    }
}

impl fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreContext")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
