//! Carts service.
//!
//! One cart per buyer session. Mutations on a cart are serialized by a
//! per-session lock; different sessions never contend. Every successful
//! mutation is written through to the `CartStore`; a failed write is logged
//! and the in-memory cart is kept.
//!
//! The `CartStore` holds the durable state. A session's cart stays resident
//! only while an operation holds it or while it has changes the store failed
//! to take; reads of a non-resident cart go straight to the store.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::domain::aggregates::{Cart, CartError, CartSnapshot, LineKey, Order, OrderQuantity, Product};
use crate::domain::value_objects::{SessionId, TierId};
use crate::storage::CartStore;
use crate::Result;

struct CartEntry {
    cart: Cart,
    /// Whether the store holds exactly `cart`'s lines.
    synced: bool,
}

type CartHandle = Arc<Mutex<CartEntry>>;

pub struct CartService {
    carts: RwLock<HashMap<SessionId, CartHandle>>,
    store: Arc<dyn CartStore>,
    currency: String,
}

impl CartService {
    pub fn new(store: Arc<dyn CartStore>, currency: impl Into<String>) -> Self {
        Self { carts: RwLock::new(HashMap::new()), store, currency: currency.into() }
    }

    pub fn currency(&self) -> &str { &self.currency }

    /// Current state of the session's cart.
    pub async fn cart(&self, session: &SessionId) -> Result<Cart> {
        let resident = self.carts.read().await.get(session).cloned();
        match resident {
            Some(handle) => {
                let cart = handle.lock().await.cart.clone();
                self.release(session, handle).await;
                Ok(cart)
            }
            None => self.load(session).await,
        }
    }

    pub async fn snapshot(&self, session: &SessionId) -> Result<CartSnapshot> {
        Ok(self.cart(session).await?.snapshot())
    }

    pub async fn add_line(
        &self,
        session: &SessionId,
        product: &Product,
        tier: TierId,
        quantity: OrderQuantity,
    ) -> Result<Cart> {
        self.mutate(session, "add_line", |cart| cart.add_line(product, tier, quantity).map(|()| true)).await
    }

    pub async fn update_quantity(&self, session: &SessionId, key: &LineKey, new_quantity: i64) -> Result<Cart> {
        self.mutate(session, "update_quantity", |cart| cart.update_quantity(key, new_quantity).map(|()| true))
            .await
    }

    pub async fn update_case_quantity(&self, session: &SessionId, key: &LineKey, new_case_count: i64) -> Result<Cart> {
        self.mutate(session, "update_case_quantity", |cart| {
            cart.update_case_quantity(key, new_case_count).map(|()| true)
        })
        .await
    }

    /// Removing a line that is not in the cart is a no-op.
    pub async fn remove_line(&self, session: &SessionId, key: &LineKey) -> Result<Cart> {
        self.mutate(session, "remove_line", |cart| Ok(cart.remove_line(key))).await
    }

    pub async fn clear(&self, session: &SessionId) -> Result<Cart> {
        self.mutate(session, "clear", |cart| {
            cart.clear();
            Ok(true)
        })
        .await
    }

    /// Converts the session's cart into an order.
    ///
    /// The cart stays locked while `place` runs, so no mutation can slip in
    /// between the snapshot and the order. The cart is emptied only if
    /// `place` succeeds.
    pub async fn check_out_with<F, Fut>(&self, session: &SessionId, place: F) -> Result<Order>
    where
        F: FnOnce(CartSnapshot) -> Fut + Send,
        Fut: Future<Output = Result<Order>> + Send,
    {
        let handle = self.handle(session).await?;
        let placed = {
            let mut entry = handle.lock().await;
            let placed = place(entry.cart.snapshot()).await;
            if placed.is_ok() {
                entry.cart.clear();
                self.persist(session, &mut entry, "check_out").await;
            }
            placed
        };
        self.release(session, handle).await;
        placed
    }

    async fn mutate<F>(&self, session: &SessionId, op: &'static str, apply: F) -> Result<Cart>
    where
        F: FnOnce(&mut Cart) -> std::result::Result<bool, CartError>,
    {
        let handle = self.handle(session).await?;
        let applied = {
            let mut entry = handle.lock().await;
            let applied = apply(&mut entry.cart);
            if let Ok(changed) = applied {
                tracing::debug!(session = %session, op, changed, lines = entry.cart.lines().len(), "cart mutated");
                if changed {
                    self.persist(session, &mut entry, op).await;
                }
            }
            applied.map(|_| entry.cart.clone())
        };
        self.release(session, handle).await;
        Ok(applied?)
    }

    async fn persist(&self, session: &SessionId, entry: &mut CartEntry, op: &'static str) {
        entry.synced = match self.store.save(session, entry.cart.lines()).await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(session = %session, op, error = %err, "failed to persist cart; keeping in-memory state");
                false
            }
        };
    }

    async fn load(&self, session: &SessionId) -> Result<Cart> {
        let lines = self.store.load(session).await?.unwrap_or_default();
        Ok(Cart::from_lines(&self.currency, lines))
    }

    /// Resident handle for the session, loading the cart if needed.
    ///
    /// Loading happens under the map's write lock so a concurrent eviction
    /// cannot race a reload of state the store has not seen yet.
    async fn handle(&self, session: &SessionId) -> Result<CartHandle> {
        if let Some(handle) = self.carts.read().await.get(session) {
            return Ok(handle.clone());
        }
        let mut carts = self.carts.write().await;
        if let Some(handle) = carts.get(session) {
            return Ok(handle.clone());
        }
        let cart = self.load(session).await?;
        let handle = Arc::new(Mutex::new(CartEntry { cart, synced: true }));
        carts.insert(session.clone(), handle.clone());
        Ok(handle)
    }

    /// Drops a session's resident cart once the store has it and no other
    /// operation holds or awaits it.
    async fn release(&self, session: &SessionId, handle: CartHandle) {
        let mut carts = self.carts.write().await;
        let idle = carts.get(session).is_some_and(|resident| Arc::ptr_eq(resident, &handle))
            && Arc::strong_count(&handle) == 2;
        let synced = idle && handle.try_lock().map(|entry| entry.synced).unwrap_or(false);
        if synced {
            carts.remove(session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{CaseKey, CaseSize, Money, ProductId, Sku};
    use crate::storage::{InMemoryCartStore, StorageError};
    use crate::CommerceError;
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    struct FailingStore;

    #[async_trait]
    impl CartStore for FailingStore {
        async fn load(&self, _session: &SessionId) -> std::result::Result<Option<Vec<crate::CartLine>>, StorageError> {
            Ok(None)
        }
        async fn save(&self, _session: &SessionId, _lines: &[crate::CartLine]) -> std::result::Result<(), StorageError> {
            Err(StorageError::Unavailable("disk full".into()))
        }
    }

    fn widget() -> Product {
        Product::create("P1", Sku::new("W1").unwrap(), "Widget")
            .with_tier_price(TierId::Gold, Money::usd(Decimal::new(1100, 2)))
    }

    fn session() -> SessionId { SessionId::new("buyer-1") }

    #[tokio::test]
    async fn test_mutations_are_persisted() {
        let store = Arc::new(InMemoryCartStore::new());
        let service = CartService::new(store.clone(), "USD");
        service.add_line(&session(), &widget(), TierId::Gold, OrderQuantity::units(3)).await.unwrap();
        let saved = store.load(&session()).await.unwrap().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].units(), 3);
    }

    #[tokio::test]
    async fn test_cart_is_rehydrated_from_store() {
        let store = Arc::new(InMemoryCartStore::new());
        CartService::new(store.clone(), "USD")
            .add_line(&session(), &widget(), TierId::Gold, OrderQuantity::units(2))
            .await
            .unwrap();
        let restarted = CartService::new(store, "USD");
        let cart = restarted.cart(&session()).await.unwrap();
        assert_eq!(cart.total().amount(), Decimal::new(22, 0));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let service = CartService::new(Arc::new(InMemoryCartStore::new()), "USD");
        service.add_line(&session(), &widget(), TierId::Gold, OrderQuantity::units(2)).await.unwrap();
        let other = service.cart(&SessionId::new("buyer-2")).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_memory_state() {
        let service = CartService::new(Arc::new(FailingStore), "USD");
        let cart = service.add_line(&session(), &widget(), TierId::Gold, OrderQuantity::units(2)).await.unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(service.cart(&session()).await.unwrap().lines().len(), 1);
    }

    #[tokio::test]
    async fn test_reads_leave_no_resident_carts() {
        let service = CartService::new(Arc::new(InMemoryCartStore::new()), "USD");
        for i in 0..1000 {
            let session = SessionId::new(format!("anon-{i}"));
            assert!(service.cart(&session).await.unwrap().is_empty());
            service.snapshot(&session).await.unwrap();
        }
        assert!(service.carts.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_persisted_cart_is_released() {
        let store = Arc::new(InMemoryCartStore::new());
        let service = CartService::new(store, "USD");
        service.add_line(&session(), &widget(), TierId::Gold, OrderQuantity::units(2)).await.unwrap();
        assert!(service.carts.read().await.is_empty());
        // Served from the store once released.
        assert_eq!(service.cart(&session()).await.unwrap().lines()[0].units(), 2);
        service.clear(&session()).await.unwrap();
        assert!(service.carts.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_unsaved_cart_stays_resident() {
        let service = CartService::new(Arc::new(FailingStore), "USD");
        service.add_line(&session(), &widget(), TierId::Gold, OrderQuantity::units(2)).await.unwrap();
        assert_eq!(service.carts.read().await.len(), 1);
        service.cart(&SessionId::new("buyer-2")).await.unwrap();
        assert_eq!(service.carts.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_validation_error_is_surfaced() {
        let service = CartService::new(Arc::new(InMemoryCartStore::new()), "USD");
        let err = service
            .add_line(&session(), &widget(), TierId::Platinum, OrderQuantity::units(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Cart(CartError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_remove_missing_line_is_noop() {
        let service = CartService::new(Arc::new(InMemoryCartStore::new()), "USD");
        service.add_line(&session(), &widget(), TierId::Gold, OrderQuantity::units(2)).await.unwrap();
        let key = LineKey::new(ProductId::new("P1"), TierId::Gold, CaseKey::for_case(&CaseSize::new(6, "Half")));
        let cart = service.remove_line(&session(), &key).await.unwrap();
        assert_eq!(cart.lines().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_adds_merge() {
        let service = Arc::new(CartService::new(Arc::new(InMemoryCartStore::new()), "USD"));
        let mut tasks = Vec::new();
        for _ in 0..20 {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                service.add_line(&session(), &widget(), TierId::Gold, OrderQuantity::units(1)).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        let cart = service.cart(&session()).await.unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].units(), 20);
    }
}
