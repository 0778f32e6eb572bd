use backline_catalog::Catalog;
use backline_core::payment::PaymentState;
use backline_core::snapshot::{OrderSnapshot, SnapshotLine};
use backline_core::SlotKey;
use backline_shared::Masked;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order lifecycle states. `pending` is the only non-terminal state a
/// new order can sit in; `paid` can still be cancelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
    Expired,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            "expired" => Some(Self::Expired),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// The transition matrix. `paid` never regresses to a payment
    /// failure state; terminal states never move.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::Paid)
            | (Self::Pending, Self::Failed)
            | (Self::Pending, Self::Expired)
            | (Self::Pending, Self::Cancelled)
            | (Self::Paid, Self::Cancelled) => true,
            _ => false,
        }
    }

    /// An occupying order keeps its items on the calendar.
    pub fn occupies(&self) -> bool {
        matches!(self, Self::Pending | Self::Paid)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-item lifecycle under the order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Booked,
    Cancelled,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Booked => "booked",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "booked" => Some(Self::Booked),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::Booked)
            | (Self::Pending, Self::Cancelled)
            | (Self::Pending, Self::Failed)
            | (Self::Booked, Self::Cancelled) => true,
            _ => false,
        }
    }

    pub fn occupies(&self) -> bool {
        matches!(self, Self::Pending | Self::Booked)
    }
}

/// Customer snapshot captured at checkout. Contact fields are masked
/// in any Debug or log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: Masked<String>,
    pub phone: Option<Masked<String>>,
}

/// Billing details captured when the customer asks for an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InvoiceDetails {
    pub company: Option<String>,
    pub vat_id: Option<String>,
    pub address: Option<String>,
}

/// One customer purchase. Totals are computed server-side from the
/// validated cart and never updated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub session_id: String,
    pub status: OrderStatus,
    pub customer: CustomerDetails,
    pub wants_invoice: bool,
    pub invoice: Option<InvoiceDetails>,
    pub accepted_terms: bool,
    pub marketing_opt_in: bool,
    pub total_cents: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: String,
        customer: CustomerDetails,
        wants_invoice: bool,
        invoice: Option<InvoiceDetails>,
        accepted_terms: bool,
        marketing_opt_in: bool,
        total_cents: i64,
        currency: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            status: OrderStatus::Pending,
            customer,
            wants_invoice,
            invoice,
            accepted_terms,
            marketing_opt_in,
            total_cents,
            currency,
            created_at: now,
            updated_at: now,
        }
    }

    /// Boundary view of the order for the gateway, invoicing and
    /// notifications. Room names come from the catalog; a room that
    /// has since left the configuration falls back to its id.
    pub fn snapshot(&self, items: &[OrderItem], catalog: &Catalog) -> OrderSnapshot {
        OrderSnapshot {
            order_id: self.id,
            session_id: self.session_id.clone(),
            customer_name: self.customer.name.clone(),
            customer_email: self.customer.email.clone(),
            customer_phone: self.customer.phone.clone(),
            total_cents: self.total_cents,
            currency: self.currency.clone(),
            lines: items
                .iter()
                .map(|item| SnapshotLine {
                    item_id: item.id,
                    room_name: catalog
                        .by_id(item.room_id)
                        .map(|room| room.name.clone())
                        .unwrap_or_else(|| item.room_id.to_string()),
                    date: item.slot_date,
                    start: item.start_time,
                    end: item.end_time,
                    price_cents: item.price_cents,
                    booking_ref: item.booking_ref.clone(),
                    check_in_code: item.check_in_code.clone(),
                })
                .collect(),
            wants_invoice: self.wants_invoice,
            invoice_company: self.invoice.as_ref().and_then(|i| i.company.clone()),
            invoice_vat_id: self.invoice.as_ref().and_then(|i| i.vat_id.clone()),
            invoice_address: self.invoice.as_ref().and_then(|i| i.address.clone()),
            created_at: self.created_at,
        }
    }
}

/// One slot inside an order. Booked items carry the booking reference
/// and check-in code assigned at settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub room_id: Uuid,
    pub event_id: Option<Uuid>,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: ItemStatus,
    pub price_cents: i64,
    pub booking_ref: Option<String>,
    pub check_in_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.room_id, self.slot_date, self.start_time)
    }
}

/// Mirror of the provider-side payment attached to an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub provider: String,
    pub provider_payment_id: String,
    pub state: PaymentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn new(
        order_id: Uuid,
        provider: &str,
        provider_payment_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            provider: provider.to_string(),
            provider_payment_id: provider_payment_id.to_string(),
            state: PaymentState::Open,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_transition_matrix() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Expired));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Paid.can_transition_to(Cancelled));

        // No regression out of paid, nothing out of terminal states.
        assert!(!Paid.can_transition_to(Pending));
        assert!(!Paid.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Paid));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Expired.can_transition_to(Paid));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn item_transition_matrix() {
        use ItemStatus::*;

        assert!(Pending.can_transition_to(Booked));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Pending.can_transition_to(Failed));
        assert!(Booked.can_transition_to(Cancelled));

        assert!(!Booked.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Booked));
        assert!(!Failed.can_transition_to(Booked));
    }

    #[test]
    fn occupying_statuses() {
        assert!(OrderStatus::Pending.occupies());
        assert!(OrderStatus::Paid.occupies());
        assert!(!OrderStatus::Failed.occupies());
        assert!(!OrderStatus::Cancelled.occupies());
        assert!(!OrderStatus::Expired.occupies());

        assert!(ItemStatus::Pending.occupies());
        assert!(ItemStatus::Booked.occupies());
        assert!(!ItemStatus::Cancelled.occupies());
        assert!(!ItemStatus::Failed.occupies());
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Failed,
            OrderStatus::Expired,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("unknown"), None);

        for status in [
            ItemStatus::Pending,
            ItemStatus::Booked,
            ItemStatus::Cancelled,
            ItemStatus::Failed,
        ] {
            assert_eq!(ItemStatus::parse(status.as_str()), Some(status));
        }
    }
}
