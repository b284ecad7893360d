//! OpenSASE Wholesale - cart, checkout and order tracking service

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opensase_wholesale::{
    api,
    catalog::ProductCatalog,
    config::AppConfig,
    messaging::{EventPublisher, NatsPublisher, NoopPublisher},
    storage::PgStore,
    Commerce,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let catalog = match &config.catalog_path {
        Some(path) => ProductCatalog::from_json_file(path)?,
        None => ProductCatalog::default(),
    };
    tracing::info!(products = catalog.len(), "catalog loaded");

    let publisher: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match NatsPublisher::connect(url).await {
            Ok(publisher) => Arc::new(publisher),
            Err(err) => {
                tracing::warn!(error = %err, "NATS unavailable; domain events will be dropped");
                Arc::new(NoopPublisher)
            }
        },
        None => Arc::new(NoopPublisher),
    };

    let commerce = match &config.database_url {
        Some(url) => {
            let store = Arc::new(PgStore::connect(url).await?);
            store.migrate().await?;
            Commerce::new(catalog, store.clone(), store, publisher, &config.currency, config.order_settings())
        }
        None => {
            tracing::warn!("DATABASE_URL not set; carts and orders are kept in memory only");
            Commerce::in_memory(catalog, publisher, &config.currency, config.order_settings())
        }
    };

    let app = api::router(commerce);
    tracing::info!(
        transitions = ?config.transition_policy,
        "🚀 OpenSASE Wholesale listening on 0.0.0.0:{}",
        config.port
    );
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
