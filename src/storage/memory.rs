//! In-process stores, used when no database is configured and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{resolve_cas, CartStore, OrderStore, SaveOutcome, StorageError};
use crate::domain::aggregates::{CartLine, Order};
use crate::domain::value_objects::{OrderId, SessionId};

#[derive(Debug, Default)]
pub struct InMemoryCartStore {
    carts: RwLock<HashMap<SessionId, Vec<CartLine>>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn load(&self, session: &SessionId) -> Result<Option<Vec<CartLine>>, StorageError> {
        Ok(self.carts.read().await.get(session).cloned())
    }

    async fn save(&self, session: &SessionId, lines: &[CartLine]) -> Result<(), StorageError> {
        self.carts.write().await.insert(session.clone(), lines.to_vec());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<SaveOutcome, StorageError> {
        let mut orders = self.orders.write().await;
        match orders.get(&order.id()) {
            Some(existing) if existing == order => Ok(SaveOutcome::AlreadyApplied),
            Some(_) => Err(StorageError::Duplicate(order.id())),
            None => {
                orders.insert(order.id(), order.clone());
                Ok(SaveOutcome::Saved)
            }
        }
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StorageError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list_for_buyer(&self, buyer: &SessionId) -> Result<Vec<Order>, StorageError> {
        let mut orders: Vec<Order> =
            self.orders.read().await.values().filter(|o| o.buyer() == buyer).cloned().collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders)
    }

    async fn compare_and_swap(&self, order: &Order, expected: u64) -> Result<SaveOutcome, StorageError> {
        let mut orders = self.orders.write().await;
        let current = orders.get(&order.id()).ok_or(StorageError::Missing(order.id()))?;
        let outcome = resolve_cas(current, order, expected)?;
        if outcome == SaveOutcome::Saved {
            orders.insert(order.id(), order.clone());
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{OrderStatus, StatusUpdate, TransitionPolicy};
    use crate::storage::test_support::placed_order;
    use chrono::Utc;

    #[tokio::test]
    async fn test_cart_store_roundtrip() {
        let store = InMemoryCartStore::new();
        let session = SessionId::new("S1");
        assert!(store.load(&session).await.unwrap().is_none());
        store.save(&session, &[]).await.unwrap();
        assert_eq!(store.load(&session).await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn test_insert_is_replay_safe() {
        let store = InMemoryOrderStore::new();
        let order = placed_order("S1");
        assert_eq!(store.insert(&order).await.unwrap(), SaveOutcome::Saved);
        assert_eq!(store.insert(&order).await.unwrap(), SaveOutcome::AlreadyApplied);
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = InMemoryOrderStore::new();
        let original = placed_order("S1");
        store.insert(&original).await.unwrap();

        let mut first = original.clone();
        first.advance(&StatusUpdate::to(OrderStatus::Processing), TransitionPolicy::Permissive, "Hub", Utc::now()).unwrap();
        assert_eq!(store.compare_and_swap(&first, 0).await.unwrap(), SaveOutcome::Saved);
        // Same write again is recognised as a replay.
        assert_eq!(store.compare_and_swap(&first, 0).await.unwrap(), SaveOutcome::AlreadyApplied);

        let mut stale = original.clone();
        stale.advance(&StatusUpdate::to(OrderStatus::Shipped), TransitionPolicy::Permissive, "Hub", Utc::now()).unwrap();
        assert!(matches!(
            store.compare_and_swap(&stale, 0).await,
            Err(StorageError::Conflict { expected: 0, actual: 1, .. })
        ));

        let stored = store.get(original.id()).await.unwrap().unwrap();
        assert_eq!(stored.tracking_history().len(), 2);
        assert_eq!(stored.status(), OrderStatus::Processing);
    }
}
