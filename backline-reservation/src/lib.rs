pub mod availability;
pub mod holds;

pub use availability::{
    AvailabilityProjector, AvailabilityStore, DayOccupancy, EventDay, OccupiedSlot,
    RoomAvailability, Slot, SlotStatus,
};
pub use holds::{ClaimOutcome, HoldManager, HoldPolicy, HoldStore, SlotHold};
