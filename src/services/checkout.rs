//! Checkout: price summaries and cart-to-order conversion.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::aggregates::{Order, PaymentConfirmation, ShippingAddress};
use crate::domain::pricing::CheckoutSummary;
use crate::domain::value_objects::{Money, SessionId};
use crate::services::{CartService, OrderService};
use crate::Result;

/// Checkout summary plus the cart's item counts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    #[serde(flatten)]
    pub pricing: CheckoutSummary,
    pub item_count: u64,
    pub total_cases: u64,
    pub total_units: u64,
}

pub struct CheckoutService {
    carts: Arc<CartService>,
    orders: Arc<OrderService>,
}

impl CheckoutService {
    pub fn new(carts: Arc<CartService>, orders: Arc<OrderService>) -> Self { Self { carts, orders } }

    pub async fn summary(&self, session: &SessionId, discount: Option<Money>) -> Result<CartSummary> {
        let cart = self.carts.cart(session).await?;
        let pricing = self.orders.summarize(&cart.snapshot(), discount)?;
        Ok(CartSummary {
            pricing,
            item_count: cart.item_count(),
            total_cases: cart.total_cases(),
            total_units: cart.total_units(),
        })
    }

    /// Turns the session's cart into an order and empties the cart.
    pub async fn checkout(
        &self,
        session: &SessionId,
        shipping_address: ShippingAddress,
        payment: PaymentConfirmation,
        discount: Option<Money>,
    ) -> Result<Order> {
        let orders = self.orders.clone();
        let buyer = session.clone();
        self.carts
            .check_out_with(session, move |snapshot| async move {
                orders.create_order(&buyer, snapshot, shipping_address, payment, discount).await
            })
            .await
    }
}
