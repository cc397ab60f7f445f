//! Photo repository trait and implementation

use crate::error::Result;
use crate::models::{Photo, PinId};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

/// Photo repository interface for read operations
#[async_trait]
pub trait PhotoRepository: Send + Sync {
    /// Album of a pin: newest download first, batch order within a download.
    ///
    /// An unknown pin has an empty album.
    async fn find_by_pin(&self, pin_id: &PinId) -> Result<Vec<Photo>>;
}

/// SQLite implementation of PhotoRepository
#[derive(Clone)]
pub struct SqlitePhotoRepository {
    pool: SqlitePool,
}

impl SqlitePhotoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PhotoRepository for SqlitePhotoRepository {
    async fn find_by_pin(&self, pin_id: &PinId) -> Result<Vec<Photo>> {
        let photos = query_as::<_, Photo>(
            "SELECT id, pin_id, url_string, download_date, position FROM photos \
             WHERE pin_id = ? ORDER BY download_date DESC, position ASC",
        )
        .bind(pin_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(photos)
    }
}
