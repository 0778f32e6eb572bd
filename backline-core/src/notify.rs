use crate::invoice::InvoiceDocument;
use crate::snapshot::OrderSnapshot;
use crate::BoxError;
use async_trait::async_trait;
use chrono_tz::Tz;

/// iCalendar attachment for confirmation messages, one VEVENT per
/// booked slot.
#[derive(Debug, Clone)]
pub struct CalendarAttachment {
    pub filename: String,
    pub ics: String,
}

impl CalendarAttachment {
    /// Render the order's booked slots as an RFC 5545 calendar. Times
    /// are local wall-clock in the business timezone, carried via TZID.
    pub fn for_order(order: &OrderSnapshot, tz: Tz) -> Self {
        let mut lines: Vec<String> = vec![
            "BEGIN:VCALENDAR".into(),
            "VERSION:2.0".into(),
            "PRODID:-//backline//booking//EN".into(),
        ];
        for item in &order.lines {
            lines.push("BEGIN:VEVENT".into());
            lines.push(format!("UID:{}@backline", item.item_id));
            lines.push(format!(
                "DTSTART;TZID={}:{}T{}00",
                tz.name(),
                item.date.format("%Y%m%d"),
                item.start.format("%H%M")
            ));
            lines.push(format!(
                "DTEND;TZID={}:{}T{}00",
                tz.name(),
                item.date.format("%Y%m%d"),
                item.end.format("%H%M")
            ));
            lines.push(format!("SUMMARY:{} rental", item.room_name));
            let mut description = format!("Booking for {}", order.customer_name);
            if let Some(reference) = &item.booking_ref {
                description.push_str(&format!("\\nReference: {reference}"));
            }
            if let Some(code) = &item.check_in_code {
                description.push_str(&format!("\\nCheck-in code: {code}"));
            }
            lines.push(format!("DESCRIPTION:{description}"));
            lines.push("END:VEVENT".into());
        }
        lines.push("END:VCALENDAR".into());
        Self {
            filename: format!("booking-{}.ics", order.order_id.simple()),
            ics: lines.join("\r\n"),
        }
    }
}

/// Boundary to customer messaging. Both calls are best-effort at every
/// call site; a failed send is logged and swallowed.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send_confirmation(
        &self,
        order: &OrderSnapshot,
        calendar: &CalendarAttachment,
        invoice: Option<&InvoiceDocument>,
    ) -> Result<(), BoxError>;

    async fn send_failure(&self, order: &OrderSnapshot) -> Result<(), BoxError>;
}

/// Logs instead of sending. Stands in until a mail provider is wired up.
pub struct LogNotificationService;

#[async_trait]
impl NotificationService for LogNotificationService {
    async fn send_confirmation(
        &self,
        order: &OrderSnapshot,
        calendar: &CalendarAttachment,
        invoice: Option<&InvoiceDocument>,
    ) -> Result<(), BoxError> {
        tracing::info!(
            order_id = %order.order_id,
            recipient = %order.customer_email,
            calendar = %calendar.filename,
            invoice = invoice.map(|i| i.number.as_str()),
            "booking confirmation sent"
        );
        Ok(())
    }

    async fn send_failure(&self, order: &OrderSnapshot) -> Result<(), BoxError> {
        tracing::info!(
            order_id = %order.order_id,
            recipient = %order.customer_email,
            "payment failure notice sent"
        );
        Ok(())
    }
}
