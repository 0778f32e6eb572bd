use crate::slots::{self, SlotTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bookable studio room. Loaded from configuration at startup and
/// immutable for the life of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub active: bool,
    /// Opening hours as whole hours in the business timezone.
    pub open_hour: u32,
    pub close_hour: u32,
    pub hourly_rate_cents: i64,
}

impl Room {
    /// The room's bookable windows for any regular day.
    pub fn daily_slots(&self) -> Vec<SlotTime> {
        slots::hourly_slots(self.open_hour, self.close_hour)
    }
}

/// How clients address a room. The discriminant travels on the wire,
/// so an id is never mistaken for a slug by its shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomRef {
    Id(Uuid),
    Slug(String),
}

/// Immutable room catalog, injected wherever rooms are resolved.
#[derive(Debug, Clone)]
pub struct Catalog {
    rooms: Vec<Room>,
}

impl Catalog {
    pub fn new(rooms: Vec<Room>) -> Self {
        Self { rooms }
    }

    pub fn resolve(&self, room_ref: &RoomRef) -> Option<&Room> {
        match room_ref {
            RoomRef::Id(id) => self.by_id(*id),
            RoomRef::Slug(slug) => self.by_slug(slug),
        }
    }

    pub fn by_id(&self, id: Uuid) -> Option<&Room> {
        self.rooms.iter().find(|room| room.id == id)
    }

    pub fn by_slug(&self, slug: &str) -> Option<&Room> {
        self.rooms.iter().find(|room| room.slug == slug)
    }

    /// Rooms shown on the availability calendar, in catalog order.
    pub fn active_rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.iter().filter(|room| room.active)
    }

    pub fn all_rooms(&self) -> &[Room] {
        &self.rooms
    }
}
