use crate::models::{ItemStatus, Order, OrderItem, OrderStatus};
use crate::references;
use crate::store::{OrderStore, SettlementTx};
use backline_catalog::Catalog;
use backline_core::invoice::InvoiceService;
use backline_core::notify::{CalendarAttachment, NotificationService};
use backline_core::payment::PaymentState;
use backline_core::{BookingError, BookingResult, BusinessClock};
use backline_shared::models::events::{OrderPaidEvent, SettlementEvent};
use backline_shared::BookingTelemetry;
use std::sync::Arc;
use uuid::Uuid;

const CODE_ATTEMPTS: usize = 5;

/// What a settlement call resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Items were booked by this call.
    Booked { items: usize },
    /// A previous settlement already booked everything.
    AlreadySettled,
    /// The provider reported a terminal failure and the order was
    /// closed with the given status.
    Closed(OrderStatus),
    /// The report required no action.
    Ignored,
}

impl SettlementOutcome {
    fn label(&self) -> String {
        match self {
            Self::Booked { .. } => "booked".to_string(),
            Self::AlreadySettled => "already_settled".to_string(),
            Self::Closed(status) => format!("closed_{status}"),
            Self::Ignored => "ignored".to_string(),
        }
    }
}

enum BookedBatch {
    Done(SettlementOutcome),
    Booked { order: Order, items: Vec<OrderItem> },
}

/// Turns terminal payment reports into bookings, exactly once.
///
/// Webhooks and client polling both land here, often for the same
/// payment within moments of each other. Idempotency is re-derived
/// from row state on every call: whoever locks the pending items
/// first books them, everyone after finds nothing left to do.
pub struct SettlementReconciler {
    store: Arc<dyn OrderStore>,
    invoices: Arc<dyn InvoiceService>,
    notifier: Arc<dyn NotificationService>,
    catalog: Arc<Catalog>,
    clock: BusinessClock,
    telemetry: BookingTelemetry,
}

impl SettlementReconciler {
    pub fn new(
        store: Arc<dyn OrderStore>,
        invoices: Arc<dyn InvoiceService>,
        notifier: Arc<dyn NotificationService>,
        catalog: Arc<Catalog>,
        clock: BusinessClock,
        telemetry: BookingTelemetry,
    ) -> Self {
        Self {
            store,
            invoices,
            notifier,
            catalog,
            clock,
            telemetry,
        }
    }

    /// Apply a provider-reported payment state to the order. Safe to
    /// call repeatedly and concurrently with the same report.
    pub async fn settle(
        &self,
        order_id: Uuid,
        reported: PaymentState,
    ) -> BookingResult<SettlementOutcome> {
        let outcome = match reported {
            PaymentState::Paid => self.settle_paid(order_id).await?,
            PaymentState::Failed => {
                self.close_unpaid(order_id, OrderStatus::Failed, true).await?
            }
            PaymentState::Canceled => {
                self.close_unpaid(order_id, OrderStatus::Cancelled, false)
                    .await?
            }
            PaymentState::Expired => {
                self.close_unpaid(order_id, OrderStatus::Expired, false)
                    .await?
            }
            PaymentState::Open | PaymentState::Pending => SettlementOutcome::Ignored,
        };

        if !matches!(outcome, SettlementOutcome::Ignored) {
            self.telemetry.log_settlement(SettlementEvent {
                order_id,
                booked_items: match outcome {
                    SettlementOutcome::Booked { items } => items,
                    _ => 0,
                },
                outcome: outcome.label(),
                timestamp: self.clock.now_utc().timestamp(),
            });
        }
        Ok(outcome)
    }

    async fn settle_paid(&self, order_id: Uuid) -> BookingResult<SettlementOutcome> {
        match self.book_items(order_id).await {
            Ok(BookedBatch::Done(outcome)) => Ok(outcome),
            Ok(BookedBatch::Booked { order, items }) => {
                let count = items.len();
                self.confirm(order, items).await;
                Ok(SettlementOutcome::Booked { items: count })
            }
            Err(err) => {
                // The booking transaction rolled back whole. Close the
                // order so the customer is not left on a dead pending
                // state, then surface the original error.
                self.close_after_booking_error(order_id).await;
                Err(err)
            }
        }
    }

    /// The transactional half of a successful payment: lock pending
    /// items, assign references and codes, flip everything in one
    /// commit.
    async fn book_items(&self, order_id: Uuid) -> BookingResult<BookedBatch> {
        let mut tx = self
            .store
            .begin_settlement()
            .await
            .map_err(BookingError::store)?;
        let order = tx
            .find_order(order_id)
            .await
            .map_err(BookingError::store)?
            .ok_or_else(|| BookingError::NotFound("order".to_string()))?;

        match order.status {
            OrderStatus::Pending | OrderStatus::Paid => {}
            other => {
                tracing::warn!(
                    order_id = %order_id,
                    status = %other,
                    "paid report for a closed order, ignoring"
                );
                return Ok(BookedBatch::Done(SettlementOutcome::Ignored));
            }
        }

        let now = self.clock.now_utc();
        let pending = tx
            .lock_pending_items(order_id)
            .await
            .map_err(BookingError::store)?;
        if pending.is_empty() {
            if order.status != OrderStatus::Paid {
                tx.set_order_status(order_id, OrderStatus::Paid, now)
                    .await
                    .map_err(BookingError::store)?;
                tx.commit().await.map_err(BookingError::store)?;
            }
            return Ok(BookedBatch::Done(SettlementOutcome::AlreadySettled));
        }

        let mut booked = Vec::with_capacity(pending.len());
        for mut item in pending {
            let reference = references::booking_ref(item.slot_date, item.id);
            let code = self.unique_code(tx.as_mut()).await?;
            tx.mark_item_booked(item.id, &reference, &code)
                .await
                .map_err(BookingError::store)?;
            item.status = ItemStatus::Booked;
            item.booking_ref = Some(reference);
            item.check_in_code = Some(code);
            booked.push(item);
        }
        tx.set_order_status(order_id, OrderStatus::Paid, now)
            .await
            .map_err(BookingError::store)?;
        tx.commit().await.map_err(BookingError::store)?;

        let mut order = order;
        order.status = OrderStatus::Paid;
        Ok(BookedBatch::Booked {
            order,
            items: booked,
        })
    }

    async fn unique_code(&self, tx: &mut dyn SettlementTx) -> BookingResult<String> {
        for _ in 0..CODE_ATTEMPTS {
            let code = references::check_in_code();
            if !tx
                .check_in_code_exists(&code)
                .await
                .map_err(BookingError::store)?
            {
                return Ok(code);
            }
        }
        Err(BookingError::CodeCollision)
    }

    /// Best-effort side effects after the booking committed. Nothing
    /// here can undo the booking; failures are logged and swallowed.
    async fn confirm(&self, order: Order, items: Vec<OrderItem>) {
        let snapshot = order.snapshot(&items, &self.catalog);

        let invoice = if order.wants_invoice {
            match self.invoices.generate(&snapshot).await {
                Ok(document) => {
                    if let Err(err) = self
                        .store
                        .record_invoice(order.id, &document.number, self.clock.now_utc())
                        .await
                    {
                        tracing::warn!(order_id = %order.id, error = %err, "could not record invoice number");
                    }
                    Some(document)
                }
                Err(err) => {
                    tracing::warn!(order_id = %order.id, error = %err, "invoice generation failed, booking stands");
                    None
                }
            }
        } else {
            None
        };

        let calendar = CalendarAttachment::for_order(&snapshot, self.clock.timezone());
        if let Err(err) = self
            .notifier
            .send_confirmation(&snapshot, &calendar, invoice.as_ref())
            .await
        {
            tracing::warn!(order_id = %order.id, error = %err, "confirmation send failed");
        }

        self.telemetry.log_order_paid(OrderPaidEvent {
            order_id: order.id,
            total_cents: order.total_cents,
            currency: order.currency.clone(),
            timestamp: self.clock.now_utc().timestamp(),
        });
    }

    /// A payment failure, cancellation or expiry closes a pending
    /// order. Items keep their rows for audit; they stop occupying
    /// slots the moment the order leaves the occupying statuses.
    async fn close_unpaid(
        &self,
        order_id: Uuid,
        to: OrderStatus,
        notify: bool,
    ) -> BookingResult<SettlementOutcome> {
        let order = self
            .store
            .find_order(order_id)
            .await
            .map_err(BookingError::store)?
            .ok_or_else(|| BookingError::NotFound("order".to_string()))?;

        if order.status != OrderStatus::Pending {
            if order.status != to {
                tracing::warn!(
                    order_id = %order_id,
                    status = %order.status,
                    reported = %to,
                    "payment report does not apply to this order state"
                );
            }
            return Ok(SettlementOutcome::Ignored);
        }

        let flipped = self
            .store
            .set_order_status(order_id, OrderStatus::Pending, to, self.clock.now_utc())
            .await
            .map_err(BookingError::store)?;
        if !flipped {
            // Another reconciler got there first.
            return Ok(SettlementOutcome::Ignored);
        }

        if notify {
            self.send_failure_notice(&order).await;
        }
        Ok(SettlementOutcome::Closed(to))
    }

    async fn close_after_booking_error(&self, order_id: Uuid) {
        let now = self.clock.now_utc();
        match self
            .store
            .set_order_status(order_id, OrderStatus::Pending, OrderStatus::Failed, now)
            .await
        {
            Ok(true) => {
                if let Ok(Some(order)) = self.store.find_order(order_id).await {
                    self.send_failure_notice(&order).await;
                }
            }
            Ok(false) => {}
            Err(err) => {
                tracing::error!(order_id = %order_id, error = %err, "could not close order after booking failure");
            }
        }
    }

    async fn send_failure_notice(&self, order: &Order) {
        let items = match self.store.items_for_order(order.id).await {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(order_id = %order.id, error = %err, "could not load items for failure notice");
                Vec::new()
            }
        };
        let snapshot = order.snapshot(&items, &self.catalog);
        if let Err(err) = self.notifier.send_failure(&snapshot).await {
            tracing::warn!(order_id = %order.id, error = %err, "failure notice send failed");
        }
    }
}
