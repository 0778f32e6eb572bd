use crate::event::SpecialEvent;
use crate::room::Room;

/// Flat per-slot pricing. Rates live on the room and event records;
/// the card owns the platform currency and the resolution rule, so
/// callers compare against one source.
#[derive(Debug, Clone)]
pub struct RateCard {
    currency: String,
}

impl RateCard {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Price of one regular hourly slot in the room.
    pub fn room_slot_price(&self, room: &Room) -> i64 {
        room.hourly_rate_cents
    }

    /// Price of one slot within a special event.
    pub fn event_slot_price(&self, event: &SpecialEvent) -> i64 {
        event.price_cents
    }
}
