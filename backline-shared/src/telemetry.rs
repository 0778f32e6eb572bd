use crate::models::events::{
    HoldCreatedEvent, HoldReleasedEvent, OrderCancelledEvent, OrderCreatedEvent, OrderPaidEvent,
    SettlementEvent,
};

/// Structured domain-event log, one line per business event.
///
/// Downstream analytics tail these through the tracing pipeline; the
/// payloads are stable serde structs so a collector can parse them
/// without scraping free-form messages.
#[derive(Clone, Default)]
pub struct BookingTelemetry;

impl BookingTelemetry {
    pub fn new() -> Self {
        Self
    }

    pub fn log_hold_created(&self, event: HoldCreatedEvent) {
        self.emit("hold_created", &event);
    }

    pub fn log_hold_released(&self, event: HoldReleasedEvent) {
        self.emit("hold_released", &event);
    }

    pub fn log_order_created(&self, event: OrderCreatedEvent) {
        self.emit("order_created", &event);
    }

    pub fn log_order_paid(&self, event: OrderPaidEvent) {
        self.emit("order_paid", &event);
    }

    pub fn log_settlement(&self, event: SettlementEvent) {
        self.emit("settlement", &event);
    }

    pub fn log_order_cancelled(&self, event: OrderCancelledEvent) {
        self.emit("order_cancelled", &event);
    }

    fn emit<T: serde::Serialize>(&self, event_type: &str, payload: &T) {
        match serde_json::to_string(payload) {
            Ok(json) => {
                tracing::info!(target: "backline::telemetry", event = event_type, payload = %json)
            }
            Err(e) => {
                tracing::warn!(target: "backline::telemetry", event = event_type, error = %e, "failed to serialize telemetry payload")
            }
        }
    }
}
