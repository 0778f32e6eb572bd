//! In-memory store and boundary fakes shared by the service tests.
//! The store mirrors the SQL semantics: conditional hold upsert,
//! occupancy as a join over live rows, transactional staging with
//! rollback-on-drop.

use crate::models::{Order, OrderItem, OrderStatus, PaymentRecord};
use crate::store::{CheckoutTx, OrderStore, SettlementTx};
use async_trait::async_trait;
use backline_catalog::{SpecialEvent, SpecialEventStore};
use backline_core::invoice::{InvoiceDocument, InvoiceService};
use backline_core::notify::{CalendarAttachment, NotificationService};
use backline_core::payment::{PaymentGateway, PaymentInit, PaymentState};
use backline_core::snapshot::OrderSnapshot;
use backline_core::{BoxError, SlotKey};
use backline_reservation::{AvailabilityStore, OccupiedSlot};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub(crate) struct HoldRow {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Default)]
pub(crate) struct State {
    pub holds: HashMap<SlotKey, HoldRow>,
    pub orders: HashMap<Uuid, Order>,
    pub items: Vec<OrderItem>,
    pub payments: HashMap<Uuid, PaymentRecord>,
    pub invoices: HashMap<Uuid, String>,
    pub codes: HashSet<String>,
}

impl State {
    /// The occupancy join: live items on live orders.
    pub fn slot_has_committed_item(&self, key: &SlotKey) -> bool {
        self.items.iter().any(|item| {
            item.key() == *key
                && item.status.occupies()
                && self
                    .orders
                    .get(&item.order_id)
                    .map(|order| order.status.occupies())
                    .unwrap_or(false)
        })
    }
}

pub(crate) struct MemStore {
    pub state: Arc<Mutex<State>>,
    pub events: Vec<SpecialEvent>,
    pub fail_mark_booked: AtomicBool,
}

impl MemStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(State::default())),
            events: Vec::new(),
            fail_mark_booked: AtomicBool::new(false),
        })
    }

    pub fn order(&self, order_id: Uuid) -> Order {
        self.state
            .lock()
            .unwrap()
            .orders
            .get(&order_id)
            .cloned()
            .unwrap()
    }

    pub fn items_of(&self, order_id: Uuid) -> Vec<OrderItem> {
        self.state
            .lock()
            .unwrap()
            .items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect()
    }

    pub fn availability(self: &Arc<Self>) -> Arc<MemAvailability> {
        Arc::new(MemAvailability {
            state: self.state.clone(),
        })
    }
}

#[async_trait]
impl OrderStore for MemStore {
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTx>, BoxError> {
        Ok(Box::new(MemCheckoutTx {
            state: self.state.clone(),
            staged_holds: Vec::new(),
            staged_order: None,
            staged_items: Vec::new(),
            staged_payment: None,
        }))
    }

    async fn begin_settlement(&self) -> Result<Box<dyn SettlementTx>, BoxError> {
        Ok(Box::new(MemSettlementTx {
            state: self.state.clone(),
            staged_bookings: Vec::new(),
            staged_status: None,
            fail_mark_booked: self.fail_mark_booked.load(Ordering::SeqCst),
        }))
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, BoxError> {
        Ok(self.state.lock().unwrap().orders.get(&order_id).cloned())
    }

    async fn items_for_order(&self, order_id: Uuid) -> Result<Vec<OrderItem>, BoxError> {
        let mut items = self.items_of(order_id);
        items.sort_by_key(|item| (item.slot_date, item.start_time));
        Ok(items)
    }

    async fn payment_for_order(&self, order_id: Uuid) -> Result<Option<PaymentRecord>, BoxError> {
        Ok(self.state.lock().unwrap().payments.get(&order_id).cloned())
    }

    async fn find_order_by_provider_payment(
        &self,
        provider_payment_id: &str,
    ) -> Result<Option<Order>, BoxError> {
        let state = self.state.lock().unwrap();
        let order_id = state
            .payments
            .values()
            .find(|payment| payment.provider_payment_id == provider_payment_id)
            .map(|payment| payment.order_id);
        Ok(order_id.and_then(|id| state.orders.get(&id).cloned()))
    }

    async fn update_payment_state(
        &self,
        order_id: Uuid,
        state: PaymentState,
        _payload: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<(), BoxError> {
        let mut guard = self.state.lock().unwrap();
        if let Some(payment) = guard.payments.get_mut(&order_id) {
            payment.state = state;
            payment.updated_at = now;
        }
        Ok(())
    }

    async fn set_order_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, BoxError> {
        let mut guard = self.state.lock().unwrap();
        match guard.orders.get_mut(&order_id) {
            Some(order) if order.status == from => {
                order.status = to;
                order.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel_order(&self, order_id: Uuid, now: DateTime<Utc>) -> Result<bool, BoxError> {
        let mut guard = self.state.lock().unwrap();
        let cancellable = guard
            .orders
            .get(&order_id)
            .map(|order| order.status.occupies())
            .unwrap_or(false);
        if !cancellable {
            return Ok(false);
        }
        if let Some(order) = guard.orders.get_mut(&order_id) {
            order.status = OrderStatus::Cancelled;
            order.updated_at = now;
        }
        for item in guard.items.iter_mut().filter(|i| i.order_id == order_id) {
            if item.status.occupies() {
                item.status = crate::models::ItemStatus::Cancelled;
            }
        }
        Ok(true)
    }

    async fn record_invoice(
        &self,
        order_id: Uuid,
        number: &str,
        _now: DateTime<Utc>,
    ) -> Result<(), BoxError> {
        self.state
            .lock()
            .unwrap()
            .invoices
            .insert(order_id, number.to_string());
        Ok(())
    }
}

pub(crate) struct MemCheckoutTx {
    state: Arc<Mutex<State>>,
    staged_holds: Vec<(SlotKey, HoldRow)>,
    staged_order: Option<Order>,
    staged_items: Vec<OrderItem>,
    staged_payment: Option<PaymentRecord>,
}

#[async_trait]
impl CheckoutTx for MemCheckoutTx {
    async fn claim_slot(
        &mut self,
        key: &SlotKey,
        session_id: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, BoxError> {
        let state = self.state.lock().unwrap();
        if let Some(hold) = state.holds.get(key) {
            if hold.session_id != session_id && hold.expires_at > now {
                return Ok(false);
            }
        }
        self.staged_holds.push((
            *key,
            HoldRow {
                session_id: session_id.to_string(),
                expires_at,
            },
        ));
        Ok(true)
    }

    async fn slot_committed(
        &mut self,
        key: &SlotKey,
        _now: DateTime<Utc>,
    ) -> Result<bool, BoxError> {
        Ok(self.state.lock().unwrap().slot_has_committed_item(key))
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), BoxError> {
        self.staged_order = Some(order.clone());
        Ok(())
    }

    async fn insert_items(&mut self, items: &[OrderItem]) -> Result<(), BoxError> {
        self.staged_items.extend_from_slice(items);
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<(), BoxError> {
        self.staged_payment = Some(payment.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), BoxError> {
        let mut state = self.state.lock().unwrap();
        for (key, row) in self.staged_holds {
            state.holds.insert(key, row);
        }
        if let Some(order) = self.staged_order {
            state.orders.insert(order.id, order);
        }
        state.items.extend(self.staged_items);
        if let Some(payment) = self.staged_payment {
            state.payments.insert(payment.order_id, payment);
        }
        Ok(())
    }
}

pub(crate) struct MemSettlementTx {
    state: Arc<Mutex<State>>,
    staged_bookings: Vec<(Uuid, String, String)>,
    staged_status: Option<(Uuid, OrderStatus, DateTime<Utc>)>,
    fail_mark_booked: bool,
}

#[async_trait]
impl SettlementTx for MemSettlementTx {
    async fn find_order(&mut self, order_id: Uuid) -> Result<Option<Order>, BoxError> {
        Ok(self.state.lock().unwrap().orders.get(&order_id).cloned())
    }

    async fn lock_pending_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>, BoxError> {
        let state = self.state.lock().unwrap();
        let mut pending: Vec<OrderItem> = state
            .items
            .iter()
            .filter(|item| {
                item.order_id == order_id && item.status == crate::models::ItemStatus::Pending
            })
            .cloned()
            .collect();
        pending.sort_by_key(|item| (item.slot_date, item.start_time));
        Ok(pending)
    }

    async fn check_in_code_exists(&mut self, code: &str) -> Result<bool, BoxError> {
        if self.staged_bookings.iter().any(|(_, _, c)| c == code) {
            return Ok(true);
        }
        Ok(self.state.lock().unwrap().codes.contains(code))
    }

    async fn mark_item_booked(
        &mut self,
        item_id: Uuid,
        booking_ref: &str,
        check_in_code: &str,
    ) -> Result<(), BoxError> {
        if self.fail_mark_booked {
            return Err("injected booking failure".into());
        }
        self.staged_bookings
            .push((item_id, booking_ref.to_string(), check_in_code.to_string()));
        Ok(())
    }

    async fn set_order_status(
        &mut self,
        order_id: Uuid,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), BoxError> {
        self.staged_status = Some((order_id, to, now));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), BoxError> {
        let mut state = self.state.lock().unwrap();
        for (item_id, booking_ref, code) in self.staged_bookings {
            if let Some(item) = state.items.iter_mut().find(|item| item.id == item_id) {
                item.status = crate::models::ItemStatus::Booked;
                item.booking_ref = Some(booking_ref);
                item.check_in_code = Some(code.clone());
            }
            state.codes.insert(code);
        }
        if let Some((order_id, to, now)) = self.staged_status {
            if let Some(order) = state.orders.get_mut(&order_id) {
                order.status = to;
                order.updated_at = now;
            }
        }
        Ok(())
    }
}

/// Availability view over the same shared state, for wiring a
/// CartValidator against the fake store.
pub(crate) struct MemAvailability {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl AvailabilityStore for MemAvailability {
    async fn occupancy_for_day(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<OccupiedSlot>, BoxError> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<OccupiedSlot> = state
            .holds
            .iter()
            .filter(|(key, hold)| key.date == date && hold.expires_at > now)
            .map(|(key, _)| OccupiedSlot {
                room_id: key.room_id,
                start_time: key.start,
            })
            .collect();
        rows.extend(
            state
                .items
                .iter()
                .filter(|item| {
                    item.slot_date == date
                        && item.status.occupies()
                        && state
                            .orders
                            .get(&item.order_id)
                            .map(|order| order.status.occupies())
                            .unwrap_or(false)
                })
                .map(|item| OccupiedSlot {
                    room_id: item.room_id,
                    start_time: item.start_time,
                }),
        );
        Ok(rows)
    }

    async fn slot_occupied(
        &self,
        room_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        now: DateTime<Utc>,
        exclude_session: Option<&str>,
    ) -> Result<bool, BoxError> {
        let key = SlotKey::new(room_id, date, start);
        let state = self.state.lock().unwrap();
        if state.slot_has_committed_item(&key) {
            return Ok(true);
        }
        if let Some(hold) = state.holds.get(&key) {
            if hold.expires_at > now && exclude_session != Some(hold.session_id.as_str()) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

pub(crate) struct MemEvents {
    pub events: Vec<SpecialEvent>,
}

#[async_trait]
impl SpecialEventStore for MemEvents {
    async fn find_active(&self, id: Uuid) -> Result<Option<SpecialEvent>, BoxError> {
        Ok(self
            .events
            .iter()
            .find(|event| event.id == id && event.active)
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<SpecialEvent>, BoxError> {
        Ok(self.events.iter().filter(|e| e.active).cloned().collect())
    }
}

/// Gateway returning a fixed state, with an optional hard failure.
pub(crate) struct StubGateway {
    pub state: Mutex<PaymentState>,
    pub fail_initiate: AtomicBool,
    pub fail_fetch: AtomicBool,
}

impl StubGateway {
    pub fn reporting(state: PaymentState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            fail_initiate: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn initiate(&self, order: &OrderSnapshot) -> Result<PaymentInit, BoxError> {
        if self.fail_initiate.load(Ordering::SeqCst) {
            return Err("gateway down".into());
        }
        Ok(PaymentInit {
            provider_payment_id: format!("stub_{}", order.order_id.simple()),
            redirect_url: "https://pay.example.test/stub".to_string(),
        })
    }

    async fn fetch_state(&self, _provider_payment_id: &str) -> Result<PaymentState, BoxError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err("gateway down".into());
        }
        Ok(*self.state.lock().unwrap())
    }
}

/// Records every send so tests can assert exactly-once delivery.
#[derive(Default)]
pub(crate) struct CountingNotifier {
    pub confirmations: AtomicUsize,
    pub failures: AtomicUsize,
    pub last_had_invoice: Mutex<Option<bool>>,
    pub last_calendar: Mutex<Option<String>>,
}

#[async_trait]
impl NotificationService for CountingNotifier {
    async fn send_confirmation(
        &self,
        _order: &OrderSnapshot,
        calendar: &CalendarAttachment,
        invoice: Option<&InvoiceDocument>,
    ) -> Result<(), BoxError> {
        self.confirmations.fetch_add(1, Ordering::SeqCst);
        *self.last_had_invoice.lock().unwrap() = Some(invoice.is_some());
        *self.last_calendar.lock().unwrap() = Some(calendar.ics.clone());
        Ok(())
    }

    async fn send_failure(&self, _order: &OrderSnapshot) -> Result<(), BoxError> {
        self.failures.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Invoice boundary that always fails, for the degraded-settlement
/// path.
pub(crate) struct FailingInvoiceService;

#[async_trait]
impl InvoiceService for FailingInvoiceService {
    async fn generate(&self, _order: &OrderSnapshot) -> Result<InvoiceDocument, BoxError> {
        Err("invoice renderer offline".into())
    }
}
