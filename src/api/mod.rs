//! JSON HTTP adapter over the commerce services.

mod cart;
mod orders;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::domain::aggregates::{CartError, OrderError, Product};
use crate::domain::value_objects::ProductId;
use crate::services::Commerce;
use crate::CommerceError;

pub use cart::{CartLineView, CartView};

pub fn router(commerce: Commerce) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-wholesale"})) }))
        .route("/api/v1/products", get(list_products))
        .route("/api/v1/products/:id", get(get_product))
        .route("/api/v1/cart/:session", get(cart::get_cart).delete(cart::clear_cart))
        .route("/api/v1/cart/:session/lines", post(cart::add_line).put(cart::update_quantity).delete(cart::remove_line))
        .route("/api/v1/cart/:session/lines/cases", put(cart::update_case_quantity))
        .route("/api/v1/cart/:session/summary", get(cart::summary))
        .route("/api/v1/checkout/:session", post(orders::checkout))
        .route("/api/v1/orders/:id", get(orders::get_order))
        .route("/api/v1/orders/:id/status", post(orders::advance))
        .route("/api/v1/buyers/:session/orders", get(orders::buyer_orders))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(commerce)
}

async fn list_products(State(s): State<Commerce>) -> Json<Vec<Product>> {
    Json(s.catalog.list().into_iter().cloned().collect())
}

async fn get_product(State(s): State<Commerce>, Path(id): Path<String>) -> Result<Json<Product>, ApiError> {
    let id = ProductId::new(id);
    s.catalog.get(&id).cloned().map(Json).ok_or(ApiError(CommerceError::ProductNotFound(id)))
}

#[derive(Debug, Serialize)]
struct ErrorBody { error: String }

/// `CommerceError` rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub CommerceError);

impl From<CommerceError> for ApiError {
    fn from(err: CommerceError) -> Self { Self(err) }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CommerceError::ProductNotFound(_) | CommerceError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            CommerceError::Cart(CartError::LineNotFound(_)) => StatusCode::NOT_FOUND,
            CommerceError::Validation(_)
            | CommerceError::Cart(CartError::Invalid(_) | CartError::NotCased(_))
            | CommerceError::Order(OrderError::Invalid(_) | OrderError::UnknownStatus(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            CommerceError::Order(OrderError::PaymentNotConfirmed(_)) => StatusCode::PAYMENT_REQUIRED,
            CommerceError::Order(OrderError::InvalidTransition { .. }) | CommerceError::ConcurrentModification(..) => {
                StatusCode::CONFLICT
            }
            CommerceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}
