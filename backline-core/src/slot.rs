use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The contended resource of the whole platform: one bookable slot,
/// identified by room, business date and start time.
///
/// Holds, order items and the availability projection all key on this
/// triple; the storage layer enforces uniqueness of live claims on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub room_id: Uuid,
    pub date: NaiveDate,
    pub start: NaiveTime,
}

impl SlotKey {
    pub fn new(room_id: Uuid, date: NaiveDate, start: NaiveTime) -> Self {
        Self {
            room_id,
            date,
            start,
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.room_id,
            self.date,
            self.start.format("%H:%M")
        )
    }
}
