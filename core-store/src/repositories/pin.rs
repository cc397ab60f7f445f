//! Pin repository trait and implementation

use crate::error::Result;
use crate::models::{Pin, PinId};
use async_trait::async_trait;
use sqlx::{query_as, query_scalar, SqlitePool};

/// Pin repository interface for read operations
#[async_trait]
pub trait PinRepository: Send + Sync {
    /// Find a pin by its ID
    ///
    /// # Returns
    /// - `Ok(Some(pin))` if found
    /// - `Ok(None)` if not found
    async fn find_by_id(&self, id: &PinId) -> Result<Option<Pin>>;

    /// All pins, newest first
    async fn list_newest_first(&self) -> Result<Vec<Pin>>;

    /// Count total pins
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of PinRepository
#[derive(Clone)]
pub struct SqlitePinRepository {
    pool: SqlitePool,
}

impl SqlitePinRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PinRepository for SqlitePinRepository {
    async fn find_by_id(&self, id: &PinId) -> Result<Option<Pin>> {
        let pin = query_as::<_, Pin>(
            "SELECT id, latitude, longitude, creation_date FROM pins WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(pin)
    }

    async fn list_newest_first(&self) -> Result<Vec<Pin>> {
        // rowid breaks ties between pins created in the same millisecond
        let pins = query_as::<_, Pin>(
            "SELECT id, latitude, longitude, creation_date FROM pins \
             ORDER BY creation_date DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(pins)
    }

    async fn count(&self) -> Result<i64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM pins")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn insert(pool: &SqlitePool, pin: &Pin) {
        sqlx::query("INSERT INTO pins (id, latitude, longitude, creation_date) VALUES (?, ?, ?, ?)")
            .bind(&pin.id)
            .bind(pin.latitude)
            .bind(pin.longitude)
            .bind(pin.creation_date)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqlitePinRepository::new(pool.clone());
        let pin = Pin::new(37.0, -122.0, 1_000);
        insert(&pool, &pin).await;

        assert_eq!(repo.find_by_id(&pin.id).await.unwrap(), Some(pin));
        assert_eq!(repo.find_by_id(&PinId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqlitePinRepository::new(pool.clone());

        let oldest = Pin::new(1.0, 1.0, 1_000);
        let newest = Pin::new(2.0, 2.0, 3_000);
        let middle = Pin::new(3.0, 3.0, 2_000);
        for pin in [&oldest, &newest, &middle] {
            insert(&pool, pin).await;
        }

        let ids: Vec<PinId> = repo
            .list_newest_first()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![newest.id, middle.id, oldest.id]);
        assert_eq!(repo.count().await.unwrap(), 3);
    }
}
