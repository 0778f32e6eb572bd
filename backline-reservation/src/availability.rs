use async_trait::async_trait;
use backline_catalog::{Catalog, SpecialEvent};
use backline_core::{BookingError, BookingResult, BoxError, BusinessClock};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Classification of one projected slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
    Unavailable,
}

/// One projected slot on the calendar. Derived on every read, never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub status: SlotStatus,
}

/// A room's projected day, in schedule order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomAvailability {
    pub room_id: Uuid,
    pub slug: String,
    pub name: String,
    pub hourly_rate_cents: i64,
    pub slots: Vec<Slot>,
}

/// One day of a special event's projected slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDay {
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

/// An occupying record: a live hold or an item of an open or paid
/// order. The projector only needs the slot coordinates.
#[derive(Debug, Clone, Copy)]
pub struct OccupiedSlot {
    pub room_id: Uuid,
    pub start_time: NaiveTime,
}

/// Occupancy of one date across all rooms, keyed for O(1) lookups.
#[derive(Debug, Default)]
pub struct DayOccupancy {
    taken: HashSet<(Uuid, NaiveTime)>,
}

impl DayOccupancy {
    pub fn from_rows(rows: Vec<OccupiedSlot>) -> Self {
        Self {
            taken: rows
                .into_iter()
                .map(|row| (row.room_id, row.start_time))
                .collect(),
        }
    }

    pub fn is_taken(&self, room_id: Uuid, start: NaiveTime) -> bool {
        self.taken.contains(&(room_id, start))
    }
}

/// Storage boundary for the occupancy union (unexpired holds plus
/// items of pending or paid orders).
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    /// Every occupying record on the date.
    async fn occupancy_for_day(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<OccupiedSlot>, BoxError>;

    /// Whether one slot is occupied. Holds owned by `exclude_session`
    /// do not count, so a session's own hold never blocks its cart.
    async fn slot_occupied(
        &self,
        room_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        now: DateTime<Utc>,
        exclude_session: Option<&str>,
    ) -> Result<bool, BoxError>;
}

/// Projects the booking calendar from the room schedules, the clock
/// and one occupancy read per day. Stateless between calls.
pub struct AvailabilityProjector {
    store: Arc<dyn AvailabilityStore>,
    catalog: Arc<Catalog>,
    clock: BusinessClock,
}

impl AvailabilityProjector {
    pub fn new(
        store: Arc<dyn AvailabilityStore>,
        catalog: Arc<Catalog>,
        clock: BusinessClock,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
        }
    }

    /// Project every active room's slots for the date.
    pub async fn project_day(&self, date: NaiveDate) -> BookingResult<Vec<RoomAvailability>> {
        let rows = self
            .store
            .occupancy_for_day(date, self.clock.now_utc())
            .await
            .map_err(BookingError::store)?;
        let occupancy = DayOccupancy::from_rows(rows);

        Ok(self
            .catalog
            .active_rooms()
            .map(|room| RoomAvailability {
                room_id: room.id,
                slug: room.slug.clone(),
                name: room.name.clone(),
                hourly_rate_cents: room.hourly_rate_cents,
                slots: room
                    .daily_slots()
                    .into_iter()
                    .map(|window| Slot {
                        start: window.start,
                        end: window.end,
                        status: self.classify(room.id, date, window.start, &occupancy),
                    })
                    .collect(),
            })
            .collect())
    }

    /// Project a special event's slots over its whole date range.
    pub async fn project_event(&self, event: &SpecialEvent) -> BookingResult<Vec<EventDay>> {
        let windows = event.daily_slots();
        let mut days = Vec::new();
        for date in event.dates() {
            let rows = self
                .store
                .occupancy_for_day(date, self.clock.now_utc())
                .await
                .map_err(BookingError::store)?;
            let occupancy = DayOccupancy::from_rows(rows);
            days.push(EventDay {
                date,
                slots: windows
                    .iter()
                    .map(|window| Slot {
                        start: window.start,
                        end: window.end,
                        status: self.classify(event.room_id, date, window.start, &occupancy),
                    })
                    .collect(),
            });
        }
        Ok(days)
    }

    /// Past beats occupied: a started slot is unavailable no matter
    /// what sits on it.
    fn classify(
        &self,
        room_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        occupancy: &DayOccupancy,
    ) -> SlotStatus {
        if self.clock.slot_has_started(date, start) {
            SlotStatus::Unavailable
        } else if occupancy.is_taken(room_id, start) {
            SlotStatus::Booked
        } else {
            SlotStatus::Available
        }
    }
}
