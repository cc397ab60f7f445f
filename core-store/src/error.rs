use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A write failed and was rolled back; nothing was applied.
    #[error("Store write failed: {0}")]
    Write(String),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl StoreError {
    pub fn pin_not_found(id: impl ToString) -> Self {
        StoreError::NotFound {
            entity_type: "Pin".to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub(crate) fn write(e: sqlx::Error) -> Self {
        StoreError::Write(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
