//! Cart endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::domain::aggregates::{Cart, CartLine, LineKey, LineQuantity, OrderQuantity};
use crate::domain::value_objects::{CaseKey, CaseSize, Money, ProductId, SessionId, TierId};
use crate::services::{CartSummary, Commerce};
use crate::CommerceError;

#[derive(Debug, Serialize, Deserialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub name: String,
    pub tier: TierId,
    pub case_key: CaseKey,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
    pub case_size: Option<CaseSize>,
    pub cases_ordered: Option<u32>,
    pub units_per_case: Option<u32>,
}

impl From<&CartLine> for CartLineView {
    fn from(line: &CartLine) -> Self {
        let (case_size, units_per_case) = match &line.quantity {
            LineQuantity::Units { .. } => (None, None),
            LineQuantity::Cased { case_size, units_per_case, .. } => (Some(case_size.clone()), Some(*units_per_case)),
        };
        Self {
            product_id: line.product_id.clone(),
            name: line.name.clone(),
            tier: line.tier,
            case_key: line.case_key(),
            quantity: line.units(),
            unit_price: line.unit_price.clone(),
            line_total: line.line_total(),
            case_size,
            cases_ordered: line.cases_ordered(),
            units_per_case,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CartView {
    pub session: SessionId,
    pub currency: String,
    pub lines: Vec<CartLineView>,
    pub total: Money,
    pub item_count: u64,
    pub total_cases: u64,
    pub total_units: u64,
    pub updated_at: DateTime<Utc>,
}

impl CartView {
    fn new(session: SessionId, cart: &Cart) -> Self {
        Self {
            session,
            currency: cart.currency().to_string(),
            lines: cart.lines().iter().map(CartLineView::from).collect(),
            total: cart.total(),
            item_count: cart.item_count(),
            total_cases: cart.total_cases(),
            total_units: cart.total_units(),
            updated_at: cart.updated_at(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddLineRequest {
    pub product_id: ProductId,
    pub tier: TierId,
    #[serde(flatten)]
    pub quantity: OrderQuantity,
}

#[derive(Debug, Deserialize)]
pub struct LineKeyParams {
    pub product_id: ProductId,
    pub tier: TierId,
    pub case_key: Option<CaseKey>,
}

impl LineKeyParams {
    fn key(self) -> LineKey { LineKey::new(self.product_id, self.tier, self.case_key.unwrap_or_default()) }
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    #[serde(flatten)]
    pub line: LineKeyParams,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCasesRequest {
    #[serde(flatten)]
    pub line: LineKeyParams,
    pub cases: i64,
}

#[derive(Debug, Deserialize)]
pub struct SummaryParams { pub discount: Option<Decimal> }

pub async fn get_cart(State(s): State<Commerce>, Path(session): Path<String>) -> Result<Json<CartView>, ApiError> {
    let session = SessionId::new(session);
    let cart = s.carts.cart(&session).await?;
    Ok(Json(CartView::new(session, &cart)))
}

pub async fn add_line(
    State(s): State<Commerce>,
    Path(session): Path<String>,
    Json(r): Json<AddLineRequest>,
) -> Result<(StatusCode, Json<CartView>), ApiError> {
    let session = SessionId::new(session);
    let product = s.catalog.get(&r.product_id).ok_or_else(|| CommerceError::ProductNotFound(r.product_id.clone()))?;
    let cart = s.carts.add_line(&session, product, r.tier, r.quantity).await?;
    Ok((StatusCode::CREATED, Json(CartView::new(session, &cart))))
}

pub async fn update_quantity(
    State(s): State<Commerce>,
    Path(session): Path<String>,
    Json(r): Json<UpdateQuantityRequest>,
) -> Result<Json<CartView>, ApiError> {
    let session = SessionId::new(session);
    let cart = s.carts.update_quantity(&session, &r.line.key(), r.quantity).await?;
    Ok(Json(CartView::new(session, &cart)))
}

pub async fn update_case_quantity(
    State(s): State<Commerce>,
    Path(session): Path<String>,
    Json(r): Json<UpdateCasesRequest>,
) -> Result<Json<CartView>, ApiError> {
    let session = SessionId::new(session);
    let cart = s.carts.update_case_quantity(&session, &r.line.key(), r.cases).await?;
    Ok(Json(CartView::new(session, &cart)))
}

pub async fn remove_line(
    State(s): State<Commerce>,
    Path(session): Path<String>,
    Query(p): Query<LineKeyParams>,
) -> Result<Json<CartView>, ApiError> {
    let session = SessionId::new(session);
    let cart = s.carts.remove_line(&session, &p.key()).await?;
    Ok(Json(CartView::new(session, &cart)))
}

pub async fn clear_cart(State(s): State<Commerce>, Path(session): Path<String>) -> Result<Json<CartView>, ApiError> {
    let session = SessionId::new(session);
    let cart = s.carts.clear(&session).await?;
    Ok(Json(CartView::new(session, &cart)))
}

pub async fn summary(
    State(s): State<Commerce>,
    Path(session): Path<String>,
    Query(p): Query<SummaryParams>,
) -> Result<Json<CartSummary>, ApiError> {
    let session = SessionId::new(session);
    let discount = p.discount.map(|d| Money::new(d, s.carts.currency()));
    Ok(Json(s.checkout.summary(&session, discount).await?))
}
