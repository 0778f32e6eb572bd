use backline_shared::Masked;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable view of an order handed to the external boundaries
/// (payment gateway, invoice service, notifications).
///
/// Built once from persisted rows; never written back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: Uuid,
    pub session_id: String,
    pub customer_name: String,
    pub customer_email: Masked<String>,
    pub customer_phone: Option<Masked<String>>,
    pub total_cents: i64,
    pub currency: String,
    pub lines: Vec<SnapshotLine>,
    pub wants_invoice: bool,
    pub invoice_company: Option<String>,
    pub invoice_vat_id: Option<String>,
    pub invoice_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One booked (or to-be-booked) slot inside a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotLine {
    pub item_id: Uuid,
    pub room_name: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub price_cents: i64,
    pub booking_ref: Option<String>,
    pub check_in_code: Option<String>,
}

impl OrderSnapshot {
    /// Sum of line prices. Used to cross-check the persisted total.
    pub fn line_total_cents(&self) -> i64 {
        self.lines.iter().map(|l| l.price_cents).sum()
    }
}
