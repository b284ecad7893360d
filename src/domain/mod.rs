//! Order and cart domain: value objects, aggregates, pricing and events.

pub mod aggregates;
pub mod events;
pub mod pricing;
pub mod value_objects;

use rust_decimal::Decimal;
use thiserror::Error;

use value_objects::{ProductId, TierId};

/// Input rejected before any state was touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    #[error("Unknown tier: {0}")]
    UnknownTier(String),

    #[error("Product {product} has no price for tier {tier}")]
    UnknownTierPrice { product: ProductId, tier: TierId },

    #[error("Malformed case configuration: {0}")]
    MalformedCase(String),

    #[error("Quantity {quantity} is not a whole number of {units_per_case}-unit cases")]
    NotCaseMultiple { quantity: i64, units_per_case: u32 },

    #[error("Currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch { expected: String, found: String },

    #[error("Negative amount: {0}")]
    NegativeAmount(Decimal),

    #[error("Invalid SKU: {0}")]
    InvalidSku(String),

    #[error("Invalid shipping address: {0}")]
    InvalidAddress(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Delivery estimate of {0} days is out of range")]
    DeliveryEstimateOutOfRange(i64),
}
