use crate::cart::{CartLine, CartValidator, ResolvedLine};
use crate::models::{CustomerDetails, InvoiceDetails, ItemStatus, Order, OrderItem, PaymentRecord};
use crate::store::OrderStore;
use backline_core::payment::PaymentGateway;
use backline_core::{BookingError, BookingResult, BusinessClock};
use backline_reservation::HoldPolicy;
use backline_shared::models::events::OrderCreatedEvent;
use backline_shared::BookingTelemetry;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Checkout input as submitted by the client. Prices inside the lines
/// are assertions, not instructions; the server recomputes the total.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub lines: Vec<CartLine>,
    pub customer: CustomerDetails,
    #[serde(default)]
    pub wants_invoice: bool,
    #[serde(default)]
    pub invoice: Option<InvoiceDetails>,
    #[serde(default)]
    pub accepted_terms: bool,
    #[serde(default)]
    pub marketing_opt_in: bool,
}

/// A created order plus where to send the customer next.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub redirect_url: String,
}

/// Turns a validated cart into a pending order with a payment attached.
///
/// The whole creation is one transaction: slot claims, order rows and
/// the payment row commit together or not at all. A gateway failure
/// after the rows were written rolls everything back, so no orphaned
/// pending order can ever occupy a slot.
pub struct CheckoutService {
    store: Arc<dyn OrderStore>,
    validator: Arc<CartValidator>,
    gateway: Arc<dyn PaymentGateway>,
    clock: BusinessClock,
    hold_policy: HoldPolicy,
    provider: String,
    currency: String,
    telemetry: BookingTelemetry,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn OrderStore>,
        validator: Arc<CartValidator>,
        gateway: Arc<dyn PaymentGateway>,
        clock: BusinessClock,
        hold_policy: HoldPolicy,
        provider: String,
        currency: String,
        telemetry: BookingTelemetry,
    ) -> Self {
        Self {
            store,
            validator,
            gateway,
            clock,
            hold_policy,
            provider,
            currency,
            telemetry,
        }
    }

    pub async fn checkout(
        &self,
        request: CheckoutRequest,
        session_id: &str,
    ) -> BookingResult<CheckoutOutcome> {
        if request.lines.is_empty() {
            return Err(BookingError::ValidationFailed("cart is empty".to_string()));
        }
        if !request.accepted_terms {
            return Err(BookingError::ValidationFailed(
                "terms must be accepted".to_string(),
            ));
        }
        if request.customer.name.trim().is_empty() {
            return Err(BookingError::ValidationFailed(
                "customer name is required".to_string(),
            ));
        }

        let mut resolved = self
            .validator
            .resolve_for_checkout(&request.lines, session_id)
            .await?;
        // Claims are taken in key order so two overlapping checkouts
        // cannot deadlock on each other's row locks.
        resolved.sort_by_key(|line| line.key());

        let now = self.clock.now_utc();
        let expires_at = self.hold_policy.expiry_from(now);

        let mut tx = self.store.begin_checkout().await.map_err(BookingError::store)?;
        for line in &resolved {
            let key = line.key();
            let claimed = tx
                .claim_slot(&key, session_id, now, expires_at)
                .await
                .map_err(BookingError::store)?;
            if !claimed {
                return Err(BookingError::SlotUnavailable(key));
            }
            // The claim only fences holds; a slot sold while the
            // customer was validating shows up here.
            if tx
                .slot_committed(&key, now)
                .await
                .map_err(BookingError::store)?
            {
                return Err(BookingError::SlotUnavailable(key));
            }
        }

        let total_cents = resolved.iter().map(|line| line.price_cents).sum();
        let order = Order::new(
            session_id.to_string(),
            request.customer,
            request.wants_invoice,
            request.invoice,
            request.accepted_terms,
            request.marketing_opt_in,
            total_cents,
            self.currency.clone(),
            now,
        );
        let items: Vec<OrderItem> = resolved
            .iter()
            .map(|line| self.item_from(line, order.id))
            .collect();

        tx.insert_order(&order).await.map_err(BookingError::store)?;
        tx.insert_items(&items).await.map_err(BookingError::store)?;

        let snapshot = order.snapshot(&items, self.validator.catalog());
        let init = self
            .gateway
            .initiate(&snapshot)
            .await
            .map_err(|err| BookingError::UpstreamPayment(err.to_string()))?;

        let payment = PaymentRecord::new(order.id, &self.provider, &init.provider_payment_id, now);
        tx.insert_payment(&payment)
            .await
            .map_err(BookingError::store)?;
        tx.commit().await.map_err(BookingError::store)?;

        self.telemetry.log_order_created(OrderCreatedEvent {
            order_id: order.id,
            session_id: session_id.to_string(),
            line_count: items.len(),
            total_cents,
            currency: order.currency.clone(),
            timestamp: now.timestamp(),
        });
        tracing::info!(order_id = %order.id, lines = items.len(), total_cents, "order created");

        Ok(CheckoutOutcome {
            order,
            items,
            redirect_url: init.redirect_url,
        })
    }

    fn item_from(&self, line: &ResolvedLine, order_id: Uuid) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            order_id,
            room_id: line.room_id,
            event_id: line.event_id,
            slot_date: line.date,
            start_time: line.start,
            end_time: line.end,
            status: ItemStatus::Pending,
            price_cents: line.price_cents,
            booking_ref: None,
            check_in_code: None,
            created_at: self.clock.now_utc(),
        }
    }
}
