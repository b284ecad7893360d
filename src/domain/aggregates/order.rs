//! Order Aggregate
//!
//! An order is created once from a cart snapshot and a confirmed payment,
//! then only ever changes through status transitions. Each transition
//! appends exactly one tracking entry; entries are never removed or edited.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::cart::{CartLine, CartSnapshot};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::pricing::CheckoutSummary;
use crate::domain::value_objects::{Money, OrderId, SessionId};
use crate::domain::ValidationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    OrderPlaced,
    Processing,
    Shipped,
    InTransit,
    OutForDelivery,
    Delivered,
}

impl OrderStatus {
    /// Fulfillment states in forward order.
    pub const SEQUENCE: [OrderStatus; 6] = [
        OrderStatus::OrderPlaced,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::InTransit,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ];

    pub fn rank(self) -> usize {
        match self {
            Self::OrderPlaced => 0,
            Self::Processing => 1,
            Self::Shipped => 2,
            Self::InTransit => 3,
            Self::OutForDelivery => 4,
            Self::Delivered => 5,
        }
    }

    pub fn is_terminal(self) -> bool { self == Self::Delivered }

    pub fn is_forward_of(self, current: OrderStatus) -> bool { self.rank() > current.rank() }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OrderPlaced => "order_placed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::InTransit => "in_transit",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
        }
    }

    /// Text recorded on the tracking entry for this status.
    pub fn description(self) -> &'static str {
        match self {
            Self::OrderPlaced => "Order received and confirmed",
            Self::Processing => "Order is being prepared for shipment",
            Self::Shipped => "Package shipped",
            Self::InTransit => "Package in transit to destination",
            Self::OutForDelivery => "Out for delivery",
            Self::Delivered => "Package delivered successfully",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SEQUENCE
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

/// How strictly status transitions follow `OrderStatus::SEQUENCE`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Any status may be written at any time; out-of-sequence moves are only logged.
    #[default]
    Permissive,
    /// Only strictly later statuses are accepted, which makes `delivered` terminal.
    ForwardOnly,
}

impl FromStr for TransitionPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "forward_only" | "forward-only" => Ok(Self::ForwardOnly),
            other => Err(format!("unknown transition policy '{other}'")),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 120))]
    pub company: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub street1: String,
    #[validate(length(max = 200))]
    pub street2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    pub state: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 56))]
    pub country: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { Succeeded, Pending, Failed }

/// Outcome of the out-of-band payment step, handed over by the payment collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub reference: String,
    pub status: PaymentStatus,
}

impl PaymentConfirmation {
    pub fn succeeded(reference: impl Into<String>) -> Self {
        Self { reference: reference.into(), status: PaymentStatus::Succeeded }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEntry {
    pub id: Uuid,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub description: String,
}

impl TrackingEntry {
    fn new(status: OrderStatus, location: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self { id: Uuid::now_v7(), status, timestamp, location: location.into(), description: status.description().to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub location: Option<String>,
}

impl StatusUpdate {
    pub fn to(status: OrderStatus) -> Self { Self { status, tracking_number: None, location: None } }
    pub fn with_tracking_number(mut self, tracking_number: impl Into<String>) -> Self {
        self.tracking_number = Some(tracking_number.into());
        self
    }
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Everything needed to place an order.
#[derive(Clone, Debug)]
pub struct NewOrder {
    pub buyer: SessionId,
    pub snapshot: CartSnapshot,
    pub summary: CheckoutSummary,
    pub shipping_address: ShippingAddress,
    pub payment: PaymentConfirmation,
    pub origin: String,
    pub delivery_estimate: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    buyer: SessionId,
    status: OrderStatus,
    line_items: Vec<CartLine>,
    subtotal: Money,
    processing_fee: Money,
    discount: Money,
    total: Money,
    payment_reference: String,
    tracking_number: Option<String>,
    estimated_delivery: DateTime<Utc>,
    delivered_date: Option<DateTime<Utc>>,
    shipping_address: ShippingAddress,
    tracking_history: Vec<TrackingEntry>,
    revision: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Order {
    pub fn place(new: NewOrder, now: DateTime<Utc>) -> Result<Self, OrderError> {
        if new.payment.status != PaymentStatus::Succeeded {
            return Err(OrderError::PaymentNotConfirmed(new.payment.reference));
        }
        if new.snapshot.lines.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        new.shipping_address
            .validate()
            .map_err(|e| ValidationError::InvalidAddress(e.to_string()))?;

        let estimated_delivery = now
            .checked_add_signed(new.delivery_estimate)
            .ok_or(ValidationError::DeliveryEstimateOutOfRange(new.delivery_estimate.num_days()))?;

        let id = OrderId::generate();
        let mut order = Self {
            id,
            buyer: new.buyer,
            status: OrderStatus::OrderPlaced,
            line_items: new.snapshot.lines,
            subtotal: new.summary.subtotal,
            processing_fee: new.summary.processing_fee,
            discount: new.summary.discount,
            total: new.summary.total,
            payment_reference: new.payment.reference,
            tracking_number: None,
            estimated_delivery,
            delivered_date: None,
            shipping_address: new.shipping_address,
            tracking_history: vec![TrackingEntry::new(OrderStatus::OrderPlaced, new.origin, now)],
            revision: 0,
            created_at: now,
            updated_at: now,
            events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: id,
            buyer: order.buyer.clone(),
            total: order.total.clone(),
            payment_reference: order.payment_reference.clone(),
        }));
        Ok(order)
    }

    pub fn id(&self) -> OrderId { self.id }
    pub fn buyer(&self) -> &SessionId { &self.buyer }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn line_items(&self) -> &[CartLine] { &self.line_items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn processing_fee(&self) -> &Money { &self.processing_fee }
    pub fn discount(&self) -> &Money { &self.discount }
    pub fn total(&self) -> &Money { &self.total }
    pub fn payment_reference(&self) -> &str { &self.payment_reference }
    pub fn tracking_number(&self) -> Option<&str> { self.tracking_number.as_deref() }
    pub fn estimated_delivery(&self) -> DateTime<Utc> { self.estimated_delivery }
    pub fn delivered_date(&self) -> Option<DateTime<Utc>> { self.delivered_date }
    pub fn shipping_address(&self) -> &ShippingAddress { &self.shipping_address }
    pub fn tracking_history(&self) -> &[TrackingEntry] { &self.tracking_history }
    pub fn last_entry_id(&self) -> Option<Uuid> { self.tracking_history.last().map(|e| e.id) }
    pub fn revision(&self) -> u64 { self.revision }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Moves the order to `update.status` and appends one tracking entry.
    ///
    /// `default_location` is used when the update carries no location.
    pub fn advance(
        &mut self,
        update: &StatusUpdate,
        policy: TransitionPolicy,
        default_location: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        let from = self.status;
        let to = update.status;
        if from.is_terminal() || !to.is_forward_of(from) {
            match policy {
                TransitionPolicy::ForwardOnly => return Err(OrderError::InvalidTransition { from, to }),
                TransitionPolicy::Permissive => {
                    tracing::warn!(order_id = %self.id, %from, %to, "accepting out-of-sequence status change");
                }
            }
        }

        self.status = to;
        if let Some(tracking_number) = &update.tracking_number {
            self.tracking_number = Some(tracking_number.clone());
        }
        // The delivered date follows the current status; a repeated delivery keeps the first one.
        match (from.is_terminal(), to.is_terminal()) {
            (false, true) => self.delivered_date = Some(now),
            (true, false) => self.delivered_date = None,
            _ => {}
        }
        let location = update.location.as_deref().unwrap_or(default_location);
        self.tracking_history.push(TrackingEntry::new(to, location, now));
        self.revision += 1;
        self.updated_at = now;
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged {
            order_id: self.id,
            from,
            to,
            tracking_number: self.tracking_number.clone(),
            revision: self.revision,
        }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("Payment {0} is not confirmed")]
    PaymentNotConfirmed(String),

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}
