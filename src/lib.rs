//! OpenSASE Wholesale
//!
//! Order and cart engine for a wholesale storefront.
//!
//! ## Features
//! - Tiered and case-based pricing
//! - Per-session carts keyed by product, tier and case configuration
//! - Checkout into immutable order snapshots
//! - Order status tracking with an append-only history

pub mod api;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod messaging;
pub mod services;
pub mod storage;

use thiserror::Error;

use domain::aggregates::{CartError, OrderError};
use domain::value_objects::{OrderId, ProductId};
use domain::ValidationError;
use storage::StorageError;

pub use domain::aggregates::{
    Cart, CartLine, CartSnapshot, LineKey, Order, OrderQuantity, OrderStatus, PaymentConfirmation, Product,
    ShippingAddress, StatusUpdate, TransitionPolicy,
};
pub use domain::value_objects::{CaseKey, CaseSize, Money, SessionId, TierId};
pub use services::{CartService, CheckoutService, Commerce, OrderService, OrderSettings};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum CommerceError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Order {0} kept changing concurrently; gave up after {1} attempts")]
    ConcurrentModification(OrderId, u32),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, CommerceError>;
