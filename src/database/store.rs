use async_trait::async_trait;
use thiserror::Error;

use crate::database::models::{Drink, DrinkPatch, NewDrink};

/// Errors from a drink store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Drink {0} not found")]
    NotFound(i32),

    /// Unique or check constraint rejected the write
    #[error("Integrity violation: {0}")]
    Conflict(String),

    #[error("Stored recipe for drink {id} is unreadable: {source}")]
    CorruptRecipe {
        id: i32,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode recipe: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Persistent table of drinks. Every mutation touches exactly one record.
#[async_trait]
pub trait DrinkStore: Send + Sync {
    /// All drinks ordered by id
    async fn all(&self) -> Result<Vec<Drink>, StoreError>;

    async fn get(&self, id: i32) -> Result<Drink, StoreError>;

    async fn create(&self, drink: NewDrink) -> Result<Drink, StoreError>;

    async fn update(&self, id: i32, patch: DrinkPatch) -> Result<Drink, StoreError>;

    async fn delete(&self, id: i32) -> Result<(), StoreError>;

    /// Cheap round trip proving the backing store answers
    async fn health_check(&self) -> Result<(), StoreError>;
}
