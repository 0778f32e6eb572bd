pub mod event;
pub mod rates;
pub mod room;
pub mod slots;

pub use event::{SpecialEvent, SpecialEventStore};
pub use rates::RateCard;
pub use room::{Catalog, Room, RoomRef};
pub use slots::SlotTime;
