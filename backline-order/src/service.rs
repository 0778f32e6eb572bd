use crate::models::{Order, OrderItem, OrderStatus};
use crate::settlement::{SettlementOutcome, SettlementReconciler};
use crate::store::OrderStore;
use backline_core::payment::{PaymentGateway, PaymentState};
use backline_core::{BookingError, BookingResult, BusinessClock};
use backline_shared::models::events::OrderCancelledEvent;
use backline_shared::BookingTelemetry;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Read model for the order status page.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment_state: Option<PaymentState>,
}

/// Order reads, cancellation and provider callbacks.
///
/// Reading a pending order polls the gateway first, so a lost webhook
/// only delays settlement until the customer looks at their order.
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    reconciler: Arc<SettlementReconciler>,
    clock: BusinessClock,
    telemetry: BookingTelemetry,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        reconciler: Arc<SettlementReconciler>,
        clock: BusinessClock,
        telemetry: BookingTelemetry,
    ) -> Self {
        Self {
            store,
            gateway,
            reconciler,
            clock,
            telemetry,
        }
    }

    /// Fetch the order, refreshing payment state for pending orders.
    /// A gateway outage degrades to the stored state instead of
    /// failing the read.
    pub async fn fetch(&self, order_id: Uuid) -> BookingResult<OrderView> {
        let order = self
            .store
            .find_order(order_id)
            .await
            .map_err(BookingError::store)?
            .ok_or_else(|| BookingError::NotFound("order".to_string()))?;

        if order.status == OrderStatus::Pending {
            self.refresh_from_gateway(order_id).await;
        }

        let order = self
            .store
            .find_order(order_id)
            .await
            .map_err(BookingError::store)?
            .ok_or_else(|| BookingError::NotFound("order".to_string()))?;
        let items = self
            .store
            .items_for_order(order_id)
            .await
            .map_err(BookingError::store)?;
        let payment_state = self
            .store
            .payment_for_order(order_id)
            .await
            .map_err(BookingError::store)?
            .map(|payment| payment.state);

        Ok(OrderView {
            order,
            items,
            payment_state,
        })
    }

    /// Cancel a pending or paid order, order and items together.
    pub async fn cancel(&self, order_id: Uuid) -> BookingResult<Order> {
        let order = self
            .store
            .find_order(order_id)
            .await
            .map_err(BookingError::store)?
            .ok_or_else(|| BookingError::NotFound("order".to_string()))?;

        if !order.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(BookingError::InvalidTransition {
                from: order.status.to_string(),
                to: OrderStatus::Cancelled.to_string(),
            });
        }

        let cancelled = self
            .store
            .cancel_order(order_id, self.clock.now_utc())
            .await
            .map_err(BookingError::store)?;
        if !cancelled {
            // Lost a race against settlement or another cancel.
            let current = self
                .store
                .find_order(order_id)
                .await
                .map_err(BookingError::store)?
                .ok_or_else(|| BookingError::NotFound("order".to_string()))?;
            return Err(BookingError::InvalidTransition {
                from: current.status.to_string(),
                to: OrderStatus::Cancelled.to_string(),
            });
        }

        self.telemetry.log_order_cancelled(OrderCancelledEvent {
            order_id,
            timestamp: self.clock.now_utc().timestamp(),
        });
        tracing::info!(order_id = %order_id, "order cancelled");

        self.store
            .find_order(order_id)
            .await
            .map_err(BookingError::store)?
            .ok_or_else(|| BookingError::NotFound("order".to_string()))
    }

    /// Provider webhook entry. The callback only identifies the
    /// payment; the state that gets applied is re-fetched from the
    /// gateway, so a forged or stale callback cannot flip an order.
    pub async fn process_provider_callback(
        &self,
        provider_payment_id: &str,
        payload: Option<serde_json::Value>,
    ) -> BookingResult<SettlementOutcome> {
        let order = self
            .store
            .find_order_by_provider_payment(provider_payment_id)
            .await
            .map_err(BookingError::store)?
            .ok_or_else(|| BookingError::NotFound("payment".to_string()))?;

        let state = self
            .gateway
            .fetch_state(provider_payment_id)
            .await
            .map_err(|err| BookingError::UpstreamPayment(err.to_string()))?;

        self.store
            .update_payment_state(order.id, state, payload, self.clock.now_utc())
            .await
            .map_err(BookingError::store)?;

        self.reconciler.settle(order.id, state).await
    }

    /// Best-effort payment refresh for the polling fallback.
    async fn refresh_from_gateway(&self, order_id: Uuid) {
        let payment = match self.store.payment_for_order(order_id).await {
            Ok(Some(payment)) => payment,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(order_id = %order_id, error = %err, "could not load payment for refresh");
                return;
            }
        };

        let state = match self.gateway.fetch_state(&payment.provider_payment_id).await {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(
                    order_id = %order_id,
                    error = %err,
                    "gateway unreachable, serving stored payment state"
                );
                return;
            }
        };
        if state == payment.state {
            return;
        }

        if let Err(err) = self
            .store
            .update_payment_state(order_id, state, None, self.clock.now_utc())
            .await
        {
            tracing::warn!(order_id = %order_id, error = %err, "could not persist refreshed payment state");
            return;
        }
        if state.is_terminal() {
            if let Err(err) = self.reconciler.settle(order_id, state).await {
                tracing::warn!(order_id = %order_id, error = %err, "inline settlement after refresh failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{CountingNotifier, MemStore, StubGateway};
    use crate::models::{CustomerDetails, ItemStatus, OrderItem, PaymentRecord};
    use backline_catalog::{Catalog, Room};
    use backline_core::invoice::MockInvoiceService;
    use backline_shared::Masked;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use std::sync::atomic::Ordering;

    fn studio_a() -> Room {
        Room {
            id: Uuid::new_v4(),
            slug: "studio-a".into(),
            name: "Studio A".into(),
            active: true,
            open_hour: 8,
            close_hour: 22,
            hourly_rate_cents: 3500,
        }
    }

    fn clock() -> BusinessClock {
        BusinessClock::fixed(
            chrono_tz::Europe::Berlin,
            Utc.with_ymd_and_hms(2025, 6, 9, 12, 0, 0).unwrap(),
        )
    }

    fn seed_pending_order(store: &MemStore, room: &Room) -> Uuid {
        let now = clock().now_utc();
        let order = Order::new(
            "guest-one".to_string(),
            CustomerDetails {
                name: "Ada".into(),
                email: Masked::from("ada@example.com".to_string()),
                phone: None,
            },
            false,
            None,
            true,
            false,
            3500,
            "EUR".to_string(),
            now,
        );
        let order_id = order.id;
        let mut state = store.state.lock().unwrap();
        state.items.push(OrderItem {
            id: Uuid::new_v4(),
            order_id,
            room_id: room.id,
            event_id: None,
            slot_date: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            status: ItemStatus::Pending,
            price_cents: 3500,
            booking_ref: None,
            check_in_code: None,
            created_at: now,
        });
        state
            .payments
            .insert(order_id, PaymentRecord::new(order_id, "mock", "pay_1", now));
        state.orders.insert(order_id, order);
        order_id
    }

    struct Rig {
        store: Arc<MemStore>,
        gateway: Arc<StubGateway>,
        notifier: Arc<CountingNotifier>,
        service: OrderService,
        room: Room,
    }

    fn rig(reported: PaymentState) -> Rig {
        let store = MemStore::new();
        let gateway = StubGateway::reporting(reported);
        let notifier = Arc::new(CountingNotifier::default());
        let room = studio_a();
        let reconciler = Arc::new(SettlementReconciler::new(
            store.clone(),
            Arc::new(MockInvoiceService),
            notifier.clone(),
            Arc::new(Catalog::new(vec![room.clone()])),
            clock(),
            BookingTelemetry::new(),
        ));
        let service = OrderService::new(
            store.clone(),
            gateway.clone(),
            reconciler,
            clock(),
            BookingTelemetry::new(),
        );
        Rig {
            store,
            gateway,
            notifier,
            service,
            room,
        }
    }

    #[tokio::test]
    async fn fetching_a_pending_order_settles_via_polling() {
        let rig = rig(PaymentState::Paid);
        let order_id = seed_pending_order(&rig.store, &rig.room);

        let view = rig.service.fetch(order_id).await.unwrap();
        assert_eq!(view.order.status, OrderStatus::Paid);
        assert_eq!(view.items[0].status, ItemStatus::Booked);
        assert!(view.items[0].booking_ref.is_some());
        assert_eq!(view.payment_state, Some(PaymentState::Paid));
        assert_eq!(rig.notifier.confirmations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gateway_outage_degrades_to_stored_state() {
        let rig = rig(PaymentState::Paid);
        rig.gateway.fail_fetch.store(true, Ordering::SeqCst);
        let order_id = seed_pending_order(&rig.store, &rig.room);

        let view = rig.service.fetch(order_id).await.unwrap();
        assert_eq!(view.order.status, OrderStatus::Pending);
        assert_eq!(view.payment_state, Some(PaymentState::Open));
    }

    #[tokio::test]
    async fn unchanged_gateway_state_settles_nothing() {
        let rig = rig(PaymentState::Open);
        let order_id = seed_pending_order(&rig.store, &rig.room);

        let view = rig.service.fetch(order_id).await.unwrap();
        assert_eq!(view.order.status, OrderStatus::Pending);
        assert_eq!(rig.notifier.confirmations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_closes_order_and_items_together() {
        let rig = rig(PaymentState::Open);
        let order_id = seed_pending_order(&rig.store, &rig.room);

        let cancelled = rig.service.cancel(order_id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        let items = rig.store.items_of(order_id);
        assert_eq!(items[0].status, ItemStatus::Cancelled);

        let again = rig.service.cancel(order_id).await;
        assert!(matches!(
            again,
            Err(BookingError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn webhook_applies_the_gateway_state_not_the_payload() {
        let rig = rig(PaymentState::Paid);
        let order_id = seed_pending_order(&rig.store, &rig.room);

        // The callback claims nothing; the gateway is authoritative.
        let outcome = rig
            .service
            .process_provider_callback("pay_1", Some(serde_json::json!({"status": "failed"})))
            .await
            .unwrap();
        assert_eq!(outcome, SettlementOutcome::Booked { items: 1 });
        assert_eq!(rig.store.order(order_id).status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn webhook_for_unknown_payment_is_not_found() {
        let rig = rig(PaymentState::Paid);
        let result = rig.service.process_provider_callback("nope", None).await;
        assert!(matches!(result, Err(BookingError::NotFound(_))));
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let rig = rig(PaymentState::Open);
        let result = rig.service.fetch(Uuid::new_v4()).await;
        assert!(matches!(result, Err(BookingError::NotFound(_))));
    }
}
