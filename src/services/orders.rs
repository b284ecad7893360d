//! Orders service: places orders from cart snapshots and drives their
//! status lifecycle.
//!
//! The `OrderStore` is the source of truth. Status changes are written with
//! a revision check; when another writer got there first the change is
//! re-applied to the fresh order instead of overwriting its history.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::domain::aggregates::{
    CartSnapshot, NewOrder, Order, PaymentConfirmation, ShippingAddress, StatusUpdate, TransitionPolicy,
};
use crate::domain::events::DomainEvent;
use crate::domain::pricing::{CheckoutSummary, FeeSchedule};
use crate::domain::value_objects::{Money, OrderId, SessionId};
use crate::messaging::EventPublisher;
use crate::storage::{OrderStore, SaveOutcome, StorageError};
use crate::{CommerceError, Result};

const MAX_ADVANCE_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct OrderSettings {
    pub fees: FeeSchedule,
    /// Location recorded on tracking entries that do not name one.
    pub origin: String,
    pub delivery_estimate: Duration,
    pub policy: TransitionPolicy,
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            fees: FeeSchedule::default(),
            origin: "Distribution Center".to_string(),
            delivery_estimate: Duration::days(7),
            policy: TransitionPolicy::default(),
        }
    }
}

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    publisher: Arc<dyn EventPublisher>,
    settings: OrderSettings,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, publisher: Arc<dyn EventPublisher>, settings: OrderSettings) -> Self {
        Self { store, publisher, settings }
    }

    pub fn summarize(&self, snapshot: &CartSnapshot, discount: Option<Money>) -> Result<CheckoutSummary> {
        Ok(CheckoutSummary::compute(snapshot.subtotal.clone(), &self.settings.fees, discount)?)
    }

    /// Places an order. Callers must only get here after the payment
    /// collaborator reported success.
    pub async fn create_order(
        &self,
        buyer: &SessionId,
        snapshot: CartSnapshot,
        shipping_address: ShippingAddress,
        payment: PaymentConfirmation,
        discount: Option<Money>,
    ) -> Result<Order> {
        let summary = self.summarize(&snapshot, discount)?;
        let mut order = Order::place(
            NewOrder {
                buyer: buyer.clone(),
                snapshot,
                summary,
                shipping_address,
                payment,
                origin: self.settings.origin.clone(),
                delivery_estimate: self.settings.delivery_estimate,
            },
            Utc::now(),
        )?;
        let events = order.take_events();
        self.store.insert(&order).await?;
        tracing::info!(
            order_id = %order.id(),
            buyer = %buyer,
            total = %order.total(),
            lines = order.line_items().len(),
            "order placed"
        );
        self.publish(events).await;
        Ok(order)
    }

    pub async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.store.get(id).await?.ok_or(CommerceError::OrderNotFound(id))
    }

    pub async fn orders_for_buyer(&self, buyer: &SessionId) -> Result<Vec<Order>> {
        Ok(self.store.list_for_buyer(buyer).await?)
    }

    /// Applies a status change, retrying against fresh state on revision conflicts.
    pub async fn advance(&self, id: OrderId, update: StatusUpdate) -> Result<Order> {
        for attempt in 1..=MAX_ADVANCE_ATTEMPTS {
            let mut order = self.get_order(id).await?;
            let expected = order.revision();
            order.advance(&update, self.settings.policy, &self.settings.origin, Utc::now())?;
            let events = order.take_events();

            match self.store.compare_and_swap(&order, expected).await {
                Ok(SaveOutcome::Saved) => {
                    tracing::info!(
                        order_id = %id,
                        status = %order.status(),
                        revision = order.revision(),
                        tracking_number = order.tracking_number().unwrap_or_default(),
                        "order status changed"
                    );
                    self.publish(events).await;
                    return Ok(order);
                }
                Ok(SaveOutcome::AlreadyApplied) => return Ok(order),
                Err(StorageError::Conflict { actual, .. }) => {
                    tracing::warn!(order_id = %id, attempt, expected, actual, "order changed concurrently; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(CommerceError::ConcurrentModification(id, MAX_ADVANCE_ATTEMPTS))
    }

    async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            if let Err(err) = self.publisher.publish(&event).await {
                tracing::warn!(subject = event.subject(), error = %err, "failed to publish domain event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Cart, OrderError, OrderQuantity, OrderStatus, PaymentStatus, Product};
    use crate::domain::events::OrderEvent;
    use crate::domain::value_objects::{CaseSize, Sku, TierId};
    use crate::domain::ValidationError;
    use crate::messaging::RecordingPublisher;
    use crate::storage::InMemoryOrderStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn address() -> ShippingAddress {
        ShippingAddress {
            name: "Ada Buyer".into(),
            street1: "1 Market St".into(),
            city: "Lagos".into(),
            postal_code: "100001".into(),
            country: "NG".into(),
            ..ShippingAddress::default()
        }
    }

    fn snapshot() -> CartSnapshot {
        let product = Product::create("P1", Sku::new("W1").unwrap(), "Widget")
            .with_tier_price(TierId::Gold, Money::usd(Decimal::new(1100, 2)))
            .with_case_size(CaseSize::new(12, "Standard"));
        let mut cart = Cart::new("USD");
        cart.add_line(&product, TierId::Gold, OrderQuantity::cases(CaseSize::new(12, "Standard"), 2)).unwrap();
        cart.snapshot()
    }

    fn service(store: Arc<dyn OrderStore>, publisher: Arc<dyn EventPublisher>) -> OrderService {
        let settings = OrderSettings { fees: FeeSchedule::none(), ..OrderSettings::default() };
        OrderService::new(store, publisher, settings)
    }

    async fn placed(service: &OrderService) -> Order {
        service
            .create_order(&SessionId::new("S1"), snapshot(), address(), PaymentConfirmation::succeeded("pay_1"), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_fetch_order() {
        let publisher = Arc::new(RecordingPublisher::new());
        let service = service(Arc::new(InMemoryOrderStore::new()), publisher.clone());
        let order = placed(&service).await;
        assert_eq!(order.status(), OrderStatus::OrderPlaced);
        assert_eq!(order.total().amount(), Decimal::new(264, 0));

        let fetched = service.get_order(order.id()).await.unwrap();
        assert_eq!(fetched, order);
        let events = publisher.events().await;
        assert!(matches!(events.as_slice(), [DomainEvent::Order(OrderEvent::Placed { .. })]));
    }

    #[tokio::test]
    async fn test_total_includes_fee_and_discount() {
        let settings = OrderSettings { fees: FeeSchedule::new(Decimal::new(1, 1), Decimal::ONE), ..OrderSettings::default() };
        let service = OrderService::new(Arc::new(InMemoryOrderStore::new()), Arc::new(RecordingPublisher::new()), settings);
        let order = service
            .create_order(
                &SessionId::new("S1"),
                snapshot(),
                address(),
                PaymentConfirmation::succeeded("pay_1"),
                Some(Money::usd(Decimal::new(10, 0))),
            )
            .await
            .unwrap();
        // 264 + (26.40 + 1) - 10
        assert_eq!(order.processing_fee().amount(), Decimal::new(2740, 2));
        assert_eq!(order.total().amount(), Decimal::new(28140, 2));
    }

    #[tokio::test]
    async fn test_unconfirmed_payment_is_rejected() {
        let store = Arc::new(InMemoryOrderStore::new());
        let service = service(store.clone(), Arc::new(RecordingPublisher::new()));
        let payment = PaymentConfirmation { reference: "pay_2".into(), status: PaymentStatus::Pending };
        let err = service
            .create_order(&SessionId::new("S1"), snapshot(), address(), payment, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Order(OrderError::PaymentNotConfirmed(_))));
        assert!(service.orders_for_buyer(&SessionId::new("S1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_delivery_estimate_is_rejected() {
        let settings = OrderSettings { delivery_estimate: Duration::days(100_000_000), ..OrderSettings::default() };
        let store = Arc::new(InMemoryOrderStore::new());
        let service = OrderService::new(store, Arc::new(RecordingPublisher::new()), settings);
        let err = service
            .create_order(&SessionId::new("S1"), snapshot(), address(), PaymentConfirmation::succeeded("pay_3"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommerceError::Order(OrderError::Invalid(ValidationError::DeliveryEstimateOutOfRange(100_000_000)))
        ));
        assert!(service.orders_for_buyer(&SessionId::new("S1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let service = service(Arc::new(InMemoryOrderStore::new()), Arc::new(RecordingPublisher::new()));
        let id = OrderId::generate();
        assert!(matches!(service.get_order(id).await, Err(CommerceError::OrderNotFound(missing)) if missing == id));
        assert!(matches!(
            service.advance(id, StatusUpdate::to(OrderStatus::Shipped)).await,
            Err(CommerceError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_advance_appends_history_and_publishes() {
        let publisher = Arc::new(RecordingPublisher::new());
        let service = service(Arc::new(InMemoryOrderStore::new()), publisher.clone());
        let order = placed(&service).await;

        let order = service
            .advance(order.id(), StatusUpdate::to(OrderStatus::Shipped).with_tracking_number("TRK1"))
            .await
            .unwrap();
        assert_eq!(order.tracking_history().len(), 2);
        assert_eq!(order.tracking_number(), Some("TRK1"));
        assert_eq!(order.tracking_history()[1].location, "Distribution Center");

        let stored = service.get_order(order.id()).await.unwrap();
        assert_eq!(stored.tracking_history(), order.tracking_history());
        assert_eq!(publisher.events().await.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_advances_keep_every_entry() {
        let service = Arc::new(service(Arc::new(InMemoryOrderStore::new()), Arc::new(RecordingPublisher::new())));
        let order = placed(&service).await;
        let statuses = [OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::InTransit];
        let mut tasks = Vec::new();
        for status in statuses {
            let service = service.clone();
            let id = order.id();
            tasks.push(tokio::spawn(async move { service.advance(id, StatusUpdate::to(status)).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        let stored = service.get_order(order.id()).await.unwrap();
        assert_eq!(stored.tracking_history().len(), 4);
        assert_eq!(stored.revision(), 3);
    }

    /// Reports a conflict on the first N compare-and-swap calls.
    struct ContendedStore {
        inner: InMemoryOrderStore,
        conflicts: AtomicU32,
    }

    #[async_trait]
    impl OrderStore for ContendedStore {
        async fn insert(&self, order: &Order) -> std::result::Result<SaveOutcome, StorageError> {
            self.inner.insert(order).await
        }
        async fn get(&self, id: OrderId) -> std::result::Result<Option<Order>, StorageError> {
            self.inner.get(id).await
        }
        async fn list_for_buyer(&self, buyer: &SessionId) -> std::result::Result<Vec<Order>, StorageError> {
            self.inner.list_for_buyer(buyer).await
        }
        async fn compare_and_swap(&self, order: &Order, expected: u64) -> std::result::Result<SaveOutcome, StorageError> {
            if self.conflicts.load(Ordering::SeqCst) > 0 {
                self.conflicts.fetch_sub(1, Ordering::SeqCst);
                return Err(StorageError::Conflict { order_id: order.id(), expected, actual: expected + 1 });
            }
            self.inner.compare_and_swap(order, expected).await
        }
    }

    #[tokio::test]
    async fn test_advance_retries_after_conflict() {
        let store = Arc::new(ContendedStore { inner: InMemoryOrderStore::new(), conflicts: AtomicU32::new(2) });
        let service = service(store, Arc::new(RecordingPublisher::new()));
        let order = placed(&service).await;
        let order = service.advance(order.id(), StatusUpdate::to(OrderStatus::Processing)).await.unwrap();
        assert_eq!(order.tracking_history().len(), 2);
    }

    #[tokio::test]
    async fn test_advance_gives_up_after_repeated_conflicts() {
        let store = Arc::new(ContendedStore { inner: InMemoryOrderStore::new(), conflicts: AtomicU32::new(100) });
        let service = service(store, Arc::new(RecordingPublisher::new()));
        let order = placed(&service).await;
        let err = service.advance(order.id(), StatusUpdate::to(OrderStatus::Processing)).await.unwrap_err();
        assert!(matches!(err, CommerceError::ConcurrentModification(_, MAX_ADVANCE_ATTEMPTS)));
        assert_eq!(service.get_order(order.id()).await.unwrap().tracking_history().len(), 1);
    }

    #[tokio::test]
    async fn test_forward_only_policy_rejects_regression() {
        let settings = OrderSettings { policy: TransitionPolicy::ForwardOnly, ..OrderSettings::default() };
        let service = OrderService::new(Arc::new(InMemoryOrderStore::new()), Arc::new(RecordingPublisher::new()), settings);
        let order = placed(&service).await;
        service.advance(order.id(), StatusUpdate::to(OrderStatus::Delivered)).await.unwrap();
        let err = service.advance(order.id(), StatusUpdate::to(OrderStatus::Shipped)).await.unwrap_err();
        assert!(matches!(err, CommerceError::Order(OrderError::InvalidTransition { .. })));
    }
}
