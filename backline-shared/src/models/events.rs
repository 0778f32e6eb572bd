use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct HoldCreatedEvent {
    pub room_id: Uuid,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub session_id: String,
    pub expires_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct HoldReleasedEvent {
    pub room_id: Uuid,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub session_id: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderCreatedEvent {
    pub order_id: Uuid,
    pub session_id: String,
    pub line_count: usize,
    pub total_cents: i64,
    pub currency: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderPaidEvent {
    pub order_id: Uuid,
    pub total_cents: i64,
    pub currency: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SettlementEvent {
    pub order_id: Uuid,
    pub booked_items: usize,
    pub outcome: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderCancelledEvent {
    pub order_id: Uuid,
    pub timestamp: i64,
}
