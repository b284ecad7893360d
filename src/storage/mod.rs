//! Persistence ports for carts and orders.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::aggregates::{CartLine, Order};
use crate::domain::value_objects::{OrderId, SessionId};

pub mod memory;
pub mod postgres;
#[cfg(test)]
pub(crate) mod test_support;

pub use memory::{InMemoryCartStore, InMemoryOrderStore};
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Revision conflict on order {order_id}: expected {expected}, found {actual}")]
    Conflict { order_id: OrderId, expected: u64, actual: u64 },

    #[error("Order {0} already exists")]
    Duplicate(OrderId),

    #[error("Order {0} does not exist")]
    Missing(OrderId),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Result of a compare-and-swap write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The same revision was already stored (replayed write).
    AlreadyApplied,
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Lines persisted for a session, or `None` when nothing was ever saved.
    async fn load(&self, session: &SessionId) -> Result<Option<Vec<CartLine>>, StorageError>;

    /// Replaces the session's persisted lines.
    async fn save(&self, session: &SessionId, lines: &[CartLine]) -> Result<(), StorageError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a freshly placed order. Replaying an identical insert is a no-op.
    async fn insert(&self, order: &Order) -> Result<SaveOutcome, StorageError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StorageError>;

    /// Orders placed by `buyer`, newest first.
    async fn list_for_buyer(&self, buyer: &SessionId) -> Result<Vec<Order>, StorageError>;

    /// Stores `order` only if the stored revision is still `expected`.
    async fn compare_and_swap(&self, order: &Order, expected: u64) -> Result<SaveOutcome, StorageError>;
}

/// Decides the outcome of a CAS write against what is currently stored.
pub(crate) fn resolve_cas(current: &Order, incoming: &Order, expected: u64) -> Result<SaveOutcome, StorageError> {
    if current.revision() == expected {
        return Ok(SaveOutcome::Saved);
    }
    if current.revision() == incoming.revision() && current.last_entry_id() == incoming.last_entry_id() {
        return Ok(SaveOutcome::AlreadyApplied);
    }
    Err(StorageError::Conflict { order_id: incoming.id(), expected, actual: current.revision() })
}
