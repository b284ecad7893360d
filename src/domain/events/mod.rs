//! Domain events
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::{Money, OrderId, SessionId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
}

impl DomainEvent {
    /// Messaging subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Order(OrderEvent::Placed { .. }) => "commerce.orders.placed",
            Self::Order(OrderEvent::StatusChanged { .. }) => "commerce.orders.status_changed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: OrderId, buyer: SessionId, total: Money, payment_reference: String },
    StatusChanged {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        tracking_number: Option<String>,
        revision: u64,
    },
}
