//! Shared fixtures for store tests.
//!
//! Postgres-backed tests share one container started on first use. Every
//! test gets its own freshly migrated database inside it.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{Connection, PgConnection};
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::postgres::Postgres as PostgresImage;
use tokio::sync::OnceCell;
use uuid::Uuid;

use super::PgStore;
use crate::domain::aggregates::{Cart, NewOrder, Order, OrderQuantity, PaymentConfirmation, Product, ShippingAddress};
use crate::domain::pricing::{CheckoutSummary, FeeSchedule};
use crate::domain::value_objects::{Money, SessionId, Sku, TierId};

const PG_USER: &str = "wholesale_test";
const PG_PASSWORD: &str = "wholesale_test_password";

/// A freshly placed order for `buyer`, with its domain events already drained.
pub(crate) fn placed_order(buyer: &str) -> Order {
    let product = Product::create("P1", Sku::new("W1").unwrap(), "Widget")
        .with_tier_price(TierId::Silver, Money::usd(Decimal::new(5, 0)));
    let mut cart = Cart::new("USD");
    cart.add_line(&product, TierId::Silver, OrderQuantity::units(2)).unwrap();
    let snapshot = cart.snapshot();
    let summary = CheckoutSummary::compute(snapshot.subtotal.clone(), &FeeSchedule::none(), None).unwrap();
    let mut order = Order::place(
        NewOrder {
            buyer: SessionId::new(buyer),
            snapshot,
            summary,
            shipping_address: ShippingAddress {
                name: "Ada".into(),
                street1: "1 Main".into(),
                city: "Accra".into(),
                postal_code: "00233".into(),
                country: "GH".into(),
                ..ShippingAddress::default()
            },
            payment: PaymentConfirmation::succeeded("pay_1"),
            origin: "Warehouse".into(),
            delivery_estimate: Duration::days(7),
        },
        Utc::now(),
    )
    .unwrap();
    order.take_events();
    order
}

static POSTGRES: OnceCell<(ContainerAsync<PostgresImage>, String)> = OnceCell::const_new();

/// Connection URL of the shared server, without a database name.
async fn server_url() -> &'static str {
    let (_, url) = POSTGRES
        .get_or_init(|| async {
            let container = PostgresImage::default()
                .with_user(PG_USER)
                .with_password(PG_PASSWORD)
                .with_db_name(PG_USER)
                .start()
                .await
                .expect("Failed to start PostgreSQL container");
            let port = container.get_host_port_ipv4(5432).await.expect("Failed to get container port");
            let host = std::env::var("TESTCONTAINERS_HOST_OVERRIDE").unwrap_or_else(|_| "localhost".to_string());
            (container, format!("postgresql://{PG_USER}:{PG_PASSWORD}@{host}:{port}"))
        })
        .await;
    url
}

/// A `PgStore` over an isolated, migrated database.
pub(crate) async fn pg_store() -> PgStore {
    let server = server_url().await;
    let name = format!("wholesale_{}", Uuid::new_v4().simple());

    let mut admin = PgConnection::connect(&format!("{server}/{PG_USER}"))
        .await
        .expect("Failed to connect to postgres database");
    sqlx::query(&format!("CREATE DATABASE \"{name}\""))
        .execute(&mut admin)
        .await
        .expect("Failed to create test database");
    admin.close().await.expect("Failed to close admin connection");

    let store = PgStore::connect(&format!("{server}/{name}")).await.expect("Failed to connect to test database");
    store.migrate().await.expect("Failed to run migrations");
    store
}
