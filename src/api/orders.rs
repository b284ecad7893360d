//! Checkout and order tracking endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::ApiError;
use crate::domain::aggregates::{Order, PaymentConfirmation, ShippingAddress, StatusUpdate};
use crate::domain::value_objects::{Money, OrderId, SessionId};
use crate::services::Commerce;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: ShippingAddress,
    pub payment: PaymentConfirmation,
    pub discount: Option<Decimal>,
}

pub async fn checkout(
    State(s): State<Commerce>,
    Path(session): Path<String>,
    Json(r): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let session = SessionId::new(session);
    let discount = r.discount.map(|d| Money::new(d, s.carts.currency()));
    let order = s.checkout.checkout(&session, r.shipping_address, r.payment, discount).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(State(s): State<Commerce>, Path(id): Path<Uuid>) -> Result<Json<Order>, ApiError> {
    Ok(Json(s.orders.get_order(OrderId::from(id)).await?))
}

pub async fn advance(
    State(s): State<Commerce>,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(s.orders.advance(OrderId::from(id), update).await?))
}

pub async fn buyer_orders(State(s): State<Commerce>, Path(session): Path<String>) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(s.orders.orders_for_buyer(&SessionId::new(session)).await?))
}
