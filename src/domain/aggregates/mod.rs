//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::Product;
pub use order::{
    NewOrder, Order, OrderError, OrderStatus, PaymentConfirmation, PaymentStatus, ShippingAddress, StatusUpdate,
    TrackingEntry, TransitionPolicy,
};
pub use cart::{Cart, CartError, CartLine, CartSnapshot, LineKey, LineQuantity, OrderQuantity};
