//! PostgreSQL stores. Carts and orders are kept as JSONB documents; orders
//! carry a `revision` column used for compare-and-swap updates.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};

use super::{resolve_cas, CartStore, OrderStore, SaveOutcome, StorageError};
use crate::domain::aggregates::{CartLine, Order};
use crate::domain::value_objects::{OrderId, SessionId};

const LOAD_CART_SQL: &str = "SELECT lines FROM carts WHERE session_id = $1";
const SAVE_CART_SQL: &str = "INSERT INTO carts (session_id, lines, updated_at) VALUES ($1, $2, NOW()) \
     ON CONFLICT (session_id) DO UPDATE SET lines = EXCLUDED.lines, updated_at = NOW()";
const INSERT_ORDER_SQL: &str = "INSERT INTO orders (id, buyer, revision, body, created_at, updated_at) \
     VALUES ($1, $2, $3, $4, $5, NOW()) ON CONFLICT (id) DO NOTHING";
const GET_ORDER_SQL: &str = "SELECT body FROM orders WHERE id = $1";
const LIST_BUYER_ORDERS_SQL: &str = "SELECT body FROM orders WHERE buyer = $1 ORDER BY created_at DESC";
const CAS_ORDER_SQL: &str = "UPDATE orders SET body = $2, revision = $3, updated_at = NOW() \
     WHERE id = $1 AND revision = $4";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn revision_column(revision: u64) -> Result<i64, StorageError> {
    i64::try_from(revision).map_err(|_| StorageError::Unavailable(format!("revision {revision} out of range")))
}

#[async_trait]
impl CartStore for PgStore {
    async fn load(&self, session: &SessionId) -> Result<Option<Vec<CartLine>>, StorageError> {
        let row = sqlx::query_as::<_, (Json<Vec<CartLine>>,)>(LOAD_CART_SQL)
            .bind(session.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(Json(lines),)| lines))
    }

    async fn save(&self, session: &SessionId, lines: &[CartLine]) -> Result<(), StorageError> {
        sqlx::query(SAVE_CART_SQL).bind(session.as_str()).bind(Json(lines)).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert(&self, order: &Order) -> Result<SaveOutcome, StorageError> {
        let inserted = sqlx::query(INSERT_ORDER_SQL)
            .bind(order.id().as_uuid())
            .bind(order.buyer().as_str())
            .bind(revision_column(order.revision())?)
            .bind(Json(order))
            .bind(order.created_at())
            .execute(&self.pool)
            .await?
            .rows_affected();
        if inserted == 1 {
            return Ok(SaveOutcome::Saved);
        }
        match self.get(order.id()).await? {
            Some(existing) if &existing == order => Ok(SaveOutcome::AlreadyApplied),
            _ => Err(StorageError::Duplicate(order.id())),
        }
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StorageError> {
        let row = sqlx::query_as::<_, (Json<Order>,)>(GET_ORDER_SQL)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(Json(order),)| order))
    }

    async fn list_for_buyer(&self, buyer: &SessionId) -> Result<Vec<Order>, StorageError> {
        let rows = sqlx::query_as::<_, (Json<Order>,)>(LIST_BUYER_ORDERS_SQL)
            .bind(buyer.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(Json(order),)| order).collect())
    }

    async fn compare_and_swap(&self, order: &Order, expected: u64) -> Result<SaveOutcome, StorageError> {
        let updated = sqlx::query(CAS_ORDER_SQL)
            .bind(order.id().as_uuid())
            .bind(Json(order))
            .bind(revision_column(order.revision())?)
            .bind(revision_column(expected)?)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 1 {
            return Ok(SaveOutcome::Saved);
        }
        let current = self.get(order.id()).await?.ok_or(StorageError::Missing(order.id()))?;
        match resolve_cas(&current, order, expected)? {
            // The row moved under us between the UPDATE and the re-read.
            SaveOutcome::Saved => Err(StorageError::Conflict { order_id: order.id(), expected, actual: current.revision() }),
            outcome => Ok(outcome),
        }
    }
}
