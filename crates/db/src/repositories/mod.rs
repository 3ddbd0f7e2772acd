use async_trait::async_trait;
use thiserror::Error;

use cartbot_core::domain::order::{OrderId, PlacedOrder};

pub mod memory;
pub mod order;

pub use memory::InMemoryOrderRepository;
pub use order::SqlOrderRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Durable store for finalized orders. Orders are written once at checkout
/// and never mutated afterwards.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn save(&self, order: PlacedOrder) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<PlacedOrder>, RepositoryError>;
}
