//! Application services wiring the domain to storage and messaging.

pub mod cart;
pub mod checkout;
pub mod orders;

use std::sync::Arc;

pub use cart::CartService;
pub use checkout::{CartSummary, CheckoutService};
pub use orders::{OrderService, OrderSettings};

use crate::catalog::ProductCatalog;
use crate::messaging::EventPublisher;
use crate::storage::{CartStore, InMemoryCartStore, InMemoryOrderStore, OrderStore};

/// Everything the HTTP layer needs, shared behind `Arc`s.
#[derive(Clone)]
pub struct Commerce {
    pub catalog: Arc<ProductCatalog>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub checkout: Arc<CheckoutService>,
}

impl Commerce {
    pub fn new(
        catalog: ProductCatalog,
        cart_store: Arc<dyn CartStore>,
        order_store: Arc<dyn OrderStore>,
        publisher: Arc<dyn EventPublisher>,
        currency: &str,
        settings: OrderSettings,
    ) -> Self {
        let carts = Arc::new(CartService::new(cart_store, currency));
        let orders = Arc::new(OrderService::new(order_store, publisher, settings));
        let checkout = Arc::new(CheckoutService::new(carts.clone(), orders.clone()));
        Self { catalog: Arc::new(catalog), carts, orders, checkout }
    }

    /// Wires in-memory stores; nothing survives a restart.
    pub fn in_memory(
        catalog: ProductCatalog,
        publisher: Arc<dyn EventPublisher>,
        currency: &str,
        settings: OrderSettings,
    ) -> Self {
        Self::new(
            catalog,
            Arc::new(InMemoryCartStore::new()),
            Arc::new(InMemoryOrderStore::new()),
            publisher,
            currency,
            settings,
        )
    }
}
