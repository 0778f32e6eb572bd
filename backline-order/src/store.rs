use crate::models::{Order, OrderItem, OrderStatus, PaymentRecord};
use async_trait::async_trait;
use backline_core::payment::PaymentState;
use backline_core::{BoxError, SlotKey};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Storage boundary for orders, items and payment mirrors.
///
/// Checkout and settlement run inside explicit transactions obtained
/// here; everything else is a single atomic statement.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTx>, BoxError>;

    async fn begin_settlement(&self) -> Result<Box<dyn SettlementTx>, BoxError>;

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, BoxError>;

    async fn items_for_order(&self, order_id: Uuid) -> Result<Vec<OrderItem>, BoxError>;

    async fn payment_for_order(&self, order_id: Uuid) -> Result<Option<PaymentRecord>, BoxError>;

    /// Resolve a provider callback to the order it belongs to.
    async fn find_order_by_provider_payment(
        &self,
        provider_payment_id: &str,
    ) -> Result<Option<Order>, BoxError>;

    async fn update_payment_state(
        &self,
        order_id: Uuid,
        state: PaymentState,
        payload: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<(), BoxError>;

    /// Conditional status flip. `false` when the order was not in
    /// `from` anymore, which callers treat as a lost race, not an
    /// error.
    async fn set_order_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, BoxError>;

    /// Cancel the order and all of its items in one transaction.
    /// `false` when the order was no longer cancellable.
    async fn cancel_order(&self, order_id: Uuid, now: DateTime<Utc>) -> Result<bool, BoxError>;

    /// Attach the generated invoice number to the order.
    async fn record_invoice(
        &self,
        order_id: Uuid,
        number: &str,
        now: DateTime<Utc>,
    ) -> Result<(), BoxError>;
}

/// One order-creation transaction. Dropping the box without commit
/// rolls everything back, including the payment initiation's order
/// rows.
#[async_trait]
pub trait CheckoutTx: Send {
    /// Claim the slot for the checkout session through the hold
    /// table's conditional upsert. `false` means another session owns
    /// a live hold.
    async fn claim_slot(
        &mut self,
        key: &SlotKey,
        session_id: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, BoxError>;

    /// Whether a live order item already occupies the slot. Run after
    /// the claim; holds do not count here.
    async fn slot_committed(&mut self, key: &SlotKey, now: DateTime<Utc>)
        -> Result<bool, BoxError>;

    async fn insert_order(&mut self, order: &Order) -> Result<(), BoxError>;

    async fn insert_items(&mut self, items: &[OrderItem]) -> Result<(), BoxError>;

    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<(), BoxError>;

    async fn commit(self: Box<Self>) -> Result<(), BoxError>;
}

/// One settlement transaction. `lock_pending_items` takes row locks,
/// so concurrent settlements of the same order serialize on it.
#[async_trait]
pub trait SettlementTx: Send {
    async fn find_order(&mut self, order_id: Uuid) -> Result<Option<Order>, BoxError>;

    /// The order's pending items, locked for the rest of the
    /// transaction. Empty when a previous settlement already ran.
    async fn lock_pending_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>, BoxError>;

    async fn check_in_code_exists(&mut self, code: &str) -> Result<bool, BoxError>;

    async fn mark_item_booked(
        &mut self,
        item_id: Uuid,
        booking_ref: &str,
        check_in_code: &str,
    ) -> Result<(), BoxError>;

    async fn set_order_status(
        &mut self,
        order_id: Uuid,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), BoxError>;

    async fn commit(self: Box<Self>) -> Result<(), BoxError>;
}
