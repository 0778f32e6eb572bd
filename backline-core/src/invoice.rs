use crate::snapshot::OrderSnapshot;
use crate::BoxError;
use async_trait::async_trait;

/// A rendered invoice: the number that gets persisted on the order and
/// the document bytes that ride along on the confirmation email.
#[derive(Debug, Clone)]
pub struct InvoiceDocument {
    pub number: String,
    pub pdf: Vec<u8>,
}

/// Boundary to invoice rendering. Called best-effort after settlement;
/// a failure here never blocks the booking.
#[async_trait]
pub trait InvoiceService: Send + Sync {
    async fn generate(&self, order: &OrderSnapshot) -> Result<InvoiceDocument, BoxError>;
}

/// Development implementation. Produces a stable number per order and a
/// placeholder document body.
pub struct MockInvoiceService;

#[async_trait]
impl InvoiceService for MockInvoiceService {
    async fn generate(&self, order: &OrderSnapshot) -> Result<InvoiceDocument, BoxError> {
        let short = &order.order_id.simple().to_string()[..8];
        let number = format!(
            "INV-{}-{}",
            order.created_at.format("%Y%m%d"),
            short.to_uppercase()
        );
        let body = format!(
            "Invoice {number}\nOrder {}\nTotal {} {}\n",
            order.order_id,
            order.total_cents as f64 / 100.0,
            order.currency
        );
        Ok(InvoiceDocument {
            number,
            pdf: body.into_bytes(),
        })
    }
}
