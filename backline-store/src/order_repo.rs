use async_trait::async_trait;
use backline_core::payment::PaymentState;
use backline_core::{BoxError, SlotKey};
use backline_order::models::{
    CustomerDetails, InvoiceDetails, ItemStatus, Order, OrderItem, OrderStatus, PaymentRecord,
};
use backline_order::store::{CheckoutTx, OrderStore, SettlementTx};
use backline_shared::Masked;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Orders, items and the payment mirror on Postgres. Checkout and
/// settlement hand out real transactions; dropping one without commit
/// rolls it back.
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    session_id: String,
    status: String,
    customer_name: String,
    customer_email: String,
    customer_phone: Option<String>,
    wants_invoice: bool,
    invoice_company: Option<String>,
    invoice_vat_id: Option<String>,
    invoice_address: Option<String>,
    accepted_terms: bool,
    marketing_opt_in: bool,
    total_cents: i64,
    currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = BoxError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::parse(&row.status)
            .ok_or_else(|| format!("unknown order status '{}'", row.status))?;
        let invoice = if row.invoice_company.is_some()
            || row.invoice_vat_id.is_some()
            || row.invoice_address.is_some()
        {
            Some(InvoiceDetails {
                company: row.invoice_company,
                vat_id: row.invoice_vat_id,
                address: row.invoice_address,
            })
        } else {
            None
        };

        Ok(Order {
            id: row.id,
            session_id: row.session_id,
            status,
            customer: CustomerDetails {
                name: row.customer_name,
                email: Masked::from(row.customer_email),
                phone: row.customer_phone.map(Masked::from),
            },
            wants_invoice: row.wants_invoice,
            invoice,
            accepted_terms: row.accepted_terms,
            marketing_opt_in: row.marketing_opt_in,
            total_cents: row.total_cents,
            currency: row.currency,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    order_id: Uuid,
    room_id: Uuid,
    event_id: Option<Uuid>,
    slot_date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    status: String,
    price_cents: i64,
    booking_ref: Option<String>,
    check_in_code: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for OrderItem {
    type Error = BoxError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let status = ItemStatus::parse(&row.status)
            .ok_or_else(|| format!("unknown item status '{}'", row.status))?;
        Ok(OrderItem {
            id: row.id,
            order_id: row.order_id,
            room_id: row.room_id,
            event_id: row.event_id,
            slot_date: row.slot_date,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            price_cents: row.price_cents,
            booking_ref: row.booking_ref,
            check_in_code: row.check_in_code,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    order_id: Uuid,
    provider: String,
    provider_payment_id: String,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentRow> for PaymentRecord {
    fn from(row: PaymentRow) -> Self {
        PaymentRecord {
            id: row.id,
            order_id: row.order_id,
            provider: row.provider,
            provider_payment_id: row.provider_payment_id,
            state: PaymentState::parse(&row.state),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ORDER_COLUMNS: &str = "id, session_id, status, customer_name, customer_email, \
    customer_phone, wants_invoice, invoice_company, invoice_vat_id, invoice_address, \
    accepted_terms, marketing_opt_in, total_cents, currency, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, room_id, event_id, slot_date, start_time, \
    end_time, status, price_cents, booking_ref, check_in_code, created_at";

// Same conditional upsert the hold store uses; checkout claims slots
// through the identical fence so holds and checkouts contend on one
// row per slot.
const CLAIM_SQL: &str = r#"
    INSERT INTO slot_holds (id, room_id, slot_date, start_time, session_id, created_at, expires_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (room_id, slot_date, start_time) DO UPDATE SET
        session_id = EXCLUDED.session_id,
        created_at = EXCLUDED.created_at,
        expires_at = EXCLUDED.expires_at
    WHERE slot_holds.session_id = EXCLUDED.session_id
       OR slot_holds.expires_at <= $6
    RETURNING id
"#;

const COMMITTED_ITEM_SQL: &str = r#"
    SELECT EXISTS (
        SELECT 1
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE oi.room_id = $1
          AND oi.slot_date = $2
          AND oi.start_time = $3
          AND oi.status IN ('pending', 'booked')
          AND o.status IN ('pending', 'paid')
    )
"#;

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTx>, BoxError> {
        Ok(Box::new(PgCheckoutTx {
            tx: self.pool.begin().await?,
        }))
    }

    async fn begin_settlement(&self) -> Result<Box<dyn SettlementTx>, BoxError> {
        Ok(Box::new(PgSettlementTx {
            tx: self.pool.begin().await?,
        }))
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, BoxError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Order::try_from).transpose()
    }

    async fn items_for_order(&self, order_id: Uuid) -> Result<Vec<OrderItem>, BoxError> {
        let rows: Vec<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items
             WHERE order_id = $1 ORDER BY slot_date, start_time"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderItem::try_from).collect()
    }

    async fn payment_for_order(&self, order_id: Uuid) -> Result<Option<PaymentRecord>, BoxError> {
        let row: Option<PaymentRow> = sqlx::query_as(
            "SELECT id, order_id, provider, provider_payment_id, state, created_at, updated_at
             FROM payments WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PaymentRecord::from))
    }

    async fn find_order_by_provider_payment(
        &self,
        provider_payment_id: &str,
    ) -> Result<Option<Order>, BoxError> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT o.id, o.session_id, o.status, o.customer_name, o.customer_email,
                    o.customer_phone, o.wants_invoice, o.invoice_company, o.invoice_vat_id,
                    o.invoice_address, o.accepted_terms, o.marketing_opt_in, o.total_cents,
                    o.currency, o.created_at, o.updated_at
             FROM orders o
             JOIN payments p ON p.order_id = o.id
             WHERE p.provider_payment_id = $1",
        )
        .bind(provider_payment_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn update_payment_state(
        &self,
        order_id: Uuid,
        state: PaymentState,
        payload: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<(), BoxError> {
        sqlx::query(
            "UPDATE payments
             SET state = $2, last_payload = COALESCE($3, last_payload), updated_at = $4
             WHERE order_id = $1",
        )
        .bind(order_id)
        .bind(state.as_str())
        .bind(payload)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_order_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, BoxError> {
        let result = sqlx::query(
            "UPDATE orders SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2",
        )
        .bind(order_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn cancel_order(&self, order_id: Uuid, now: DateTime<Utc>) -> Result<bool, BoxError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE orders SET status = 'cancelled', updated_at = $2
             WHERE id = $1 AND status IN ('pending', 'paid')",
        )
        .bind(order_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE order_items SET status = 'cancelled'
             WHERE order_id = $1 AND status IN ('pending', 'booked')",
        )
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn record_invoice(
        &self,
        order_id: Uuid,
        number: &str,
        now: DateTime<Utc>,
    ) -> Result<(), BoxError> {
        sqlx::query(
            "INSERT INTO invoices (id, order_id, number, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (order_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(number)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

pub struct PgCheckoutTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CheckoutTx for PgCheckoutTx {
    async fn claim_slot(
        &mut self,
        key: &SlotKey,
        session_id: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, BoxError> {
        let claimed: Option<Uuid> = sqlx::query_scalar(CLAIM_SQL)
            .bind(Uuid::new_v4())
            .bind(key.room_id)
            .bind(key.date)
            .bind(key.start)
            .bind(session_id)
            .bind(now)
            .bind(expires_at)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(claimed.is_some())
    }

    async fn slot_committed(
        &mut self,
        key: &SlotKey,
        _now: DateTime<Utc>,
    ) -> Result<bool, BoxError> {
        let sold: bool = sqlx::query_scalar(COMMITTED_ITEM_SQL)
            .bind(key.room_id)
            .bind(key.date)
            .bind(key.start)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(sold)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), BoxError> {
        sqlx::query(
            "INSERT INTO orders (id, session_id, status, customer_name, customer_email,
                 customer_phone, wants_invoice, invoice_company, invoice_vat_id,
                 invoice_address, accepted_terms, marketing_opt_in, total_cents, currency,
                 created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(order.id)
        .bind(&order.session_id)
        .bind(order.status.as_str())
        .bind(&order.customer.name)
        .bind(order.customer.email.inner())
        .bind(order.customer.phone.as_ref().map(|phone| phone.inner().clone()))
        .bind(order.wants_invoice)
        .bind(order.invoice.as_ref().and_then(|i| i.company.clone()))
        .bind(order.invoice.as_ref().and_then(|i| i.vat_id.clone()))
        .bind(order.invoice.as_ref().and_then(|i| i.address.clone()))
        .bind(order.accepted_terms)
        .bind(order.marketing_opt_in)
        .bind(order.total_cents)
        .bind(&order.currency)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_items(&mut self, items: &[OrderItem]) -> Result<(), BoxError> {
        for item in items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, room_id, event_id, slot_date,
                     start_time, end_time, status, price_cents, booking_ref, check_in_code,
                     created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.room_id)
            .bind(item.event_id)
            .bind(item.slot_date)
            .bind(item.start_time)
            .bind(item.end_time)
            .bind(item.status.as_str())
            .bind(item.price_cents)
            .bind(&item.booking_ref)
            .bind(&item.check_in_code)
            .bind(item.created_at)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<(), BoxError> {
        sqlx::query(
            "INSERT INTO payments (id, order_id, provider, provider_payment_id, state,
                 created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(payment.id)
        .bind(payment.order_id)
        .bind(&payment.provider)
        .bind(&payment.provider_payment_id)
        .bind(payment.state.as_str())
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), BoxError> {
        self.tx.commit().await?;
        Ok(())
    }
}

pub struct PgSettlementTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SettlementTx for PgSettlementTx {
    async fn find_order(&mut self, order_id: Uuid) -> Result<Option<Order>, BoxError> {
        // The row lock serializes settlements of the same order for
        // the rest of the transaction.
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn lock_pending_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>, BoxError> {
        let rows: Vec<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items
             WHERE order_id = $1 AND status = 'pending'
             ORDER BY slot_date, start_time
             FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(OrderItem::try_from).collect()
    }

    async fn check_in_code_exists(&mut self, code: &str) -> Result<bool, BoxError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM order_items WHERE check_in_code = $1)")
                .bind(code)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(exists)
    }

    async fn mark_item_booked(
        &mut self,
        item_id: Uuid,
        booking_ref: &str,
        check_in_code: &str,
    ) -> Result<(), BoxError> {
        sqlx::query(
            "UPDATE order_items SET status = 'booked', booking_ref = $2, check_in_code = $3
             WHERE id = $1",
        )
        .bind(item_id)
        .bind(booking_ref)
        .bind(check_in_code)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn set_order_status(
        &mut self,
        order_id: Uuid,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), BoxError> {
        sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order_id)
            .bind(to.as_str())
            .bind(now)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), BoxError> {
        self.tx.commit().await?;
        Ok(())
    }
}
