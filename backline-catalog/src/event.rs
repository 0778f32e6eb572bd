use crate::slots::{self, SlotTime};
use async_trait::async_trait;
use backline_core::BoxError;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A special event: a room rented out in custom-length slots over a
/// date range (workshops, rehearsal marathons), priced per slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialEvent {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub room_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_minutes: u32,
    pub price_cents: i64,
    pub active: bool,
}

impl SpecialEvent {
    /// Whether the event runs on the given date (inclusive range).
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// The event's slot windows for any covered day.
    pub fn daily_slots(&self) -> Vec<SlotTime> {
        slots::event_slots(self.start_time, self.end_time, self.slot_minutes)
    }

    /// Every date the event runs on, in order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start_date
            .iter_days()
            .take_while(move |date| *date <= self.end_date)
    }
}

/// Storage boundary for special events.
#[async_trait]
pub trait SpecialEventStore: Send + Sync {
    async fn find_active(&self, id: Uuid) -> Result<Option<SpecialEvent>, BoxError>;

    async fn list_active(&self) -> Result<Vec<SpecialEvent>, BoxError>;
}
