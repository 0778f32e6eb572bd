use backline_catalog::{Catalog, RateCard, RoomRef, SpecialEvent, SpecialEventStore};
use backline_core::{BookingError, BookingResult, BusinessClock, SlotKey};
use backline_reservation::AvailabilityStore;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// One line of a client cart. The discriminant travels on the wire, so
/// regular rentals and event bookings are never confused by shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartLine {
    Room {
        room: RoomRef,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        price_cents: i64,
    },
    Event {
        event_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        price_cents: i64,
    },
}

/// Why a line was refused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum LineRejection {
    UnknownRoom,
    RoomInactive,
    UnknownEvent,
    OutsideEventDates,
    InvalidWindow,
    SlotInPast,
    SlotTaken,
    DuplicateLine,
    PriceMismatch { expected_cents: i64 },
}

impl fmt::Display for LineRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownRoom => write!(f, "room does not exist"),
            Self::RoomInactive => write!(f, "room is not bookable"),
            Self::UnknownEvent => write!(f, "event does not exist"),
            Self::OutsideEventDates => write!(f, "date is outside the event"),
            Self::InvalidWindow => write!(f, "slot window does not match the schedule"),
            Self::SlotInPast => write!(f, "slot is in the past"),
            Self::SlotTaken => write!(f, "slot is no longer available"),
            Self::DuplicateLine => write!(f, "slot appears twice in the cart"),
            Self::PriceMismatch { expected_cents } => {
                write!(f, "price changed, current price is {expected_cents}")
            }
        }
    }
}

/// Per-line result of a cart review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineVerdict {
    pub line: CartLine,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<LineRejection>,
    /// Current server-side price, present whenever the room or event
    /// resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,
}

/// Full cart diagnostics. Advisory only: checkout re-runs the same
/// checks inside its transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartReview {
    pub lines: Vec<LineVerdict>,
    pub all_valid: bool,
    /// Server-computed sum over the valid lines.
    pub total_cents: i64,
    pub currency: String,
}

/// A line accepted by validation, with its slot coordinates and the
/// server-side price that will be charged.
#[derive(Debug, Clone)]
pub struct ResolvedLine {
    pub room_id: Uuid,
    pub event_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub price_cents: i64,
}

impl ResolvedLine {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.room_id, self.date, self.start)
    }
}

struct CheckedLine {
    resolved: Option<ResolvedLine>,
    rejection: Option<LineRejection>,
}

impl CheckedLine {
    fn rejected(rejection: LineRejection) -> Self {
        Self {
            resolved: None,
            rejection: Some(rejection),
        }
    }
}

/// Validates carts against the catalog, the clock, the rate card and
/// live occupancy. Every line is judged independently; one bad line
/// never hides another.
pub struct CartValidator {
    catalog: Arc<Catalog>,
    events: Arc<dyn SpecialEventStore>,
    availability: Arc<dyn AvailabilityStore>,
    rates: RateCard,
    clock: BusinessClock,
}

impl CartValidator {
    pub fn new(
        catalog: Arc<Catalog>,
        events: Arc<dyn SpecialEventStore>,
        availability: Arc<dyn AvailabilityStore>,
        rates: RateCard,
        clock: BusinessClock,
    ) -> Self {
        Self {
            catalog,
            events,
            availability,
            rates,
            clock,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Full diagnostics for the cart. The session's own holds do not
    /// count as occupancy, so a held slot validates clean for the
    /// holder.
    pub async fn review(&self, lines: &[CartLine], session_id: &str) -> BookingResult<CartReview> {
        let checked = self.check_lines(lines, session_id).await?;
        let total_cents = checked
            .iter()
            .filter(|check| check.rejection.is_none())
            .filter_map(|check| check.resolved.as_ref())
            .map(|resolved| resolved.price_cents)
            .sum();
        let all_valid = checked.iter().all(|check| check.rejection.is_none());

        Ok(CartReview {
            lines: lines
                .iter()
                .zip(checked.iter())
                .map(|(line, check)| LineVerdict {
                    line: line.clone(),
                    valid: check.rejection.is_none(),
                    rejection: check.rejection.clone(),
                    price_cents: check.resolved.as_ref().map(|r| r.price_cents),
                })
                .collect(),
            all_valid,
            total_cents,
            currency: self.rates.currency().to_string(),
        })
    }

    /// Strict pass for checkout: the first rejection aborts with a
    /// validation error naming it.
    pub async fn resolve_for_checkout(
        &self,
        lines: &[CartLine],
        session_id: &str,
    ) -> BookingResult<Vec<ResolvedLine>> {
        let checked = self.check_lines(lines, session_id).await?;
        let mut resolved = Vec::with_capacity(checked.len());
        for check in checked {
            if let Some(rejection) = check.rejection {
                return Err(BookingError::ValidationFailed(rejection.to_string()));
            }
            match check.resolved {
                Some(line) => resolved.push(line),
                None => {
                    return Err(BookingError::ValidationFailed(
                        "cart line could not be resolved".to_string(),
                    ))
                }
            }
        }
        Ok(resolved)
    }

    async fn check_lines(
        &self,
        lines: &[CartLine],
        session_id: &str,
    ) -> BookingResult<Vec<CheckedLine>> {
        let mut seen: HashSet<SlotKey> = HashSet::new();
        let mut checked = Vec::with_capacity(lines.len());
        for line in lines {
            let mut check = self.check_line(line, session_id).await?;
            if check.rejection.is_none() {
                if let Some(resolved) = &check.resolved {
                    if !seen.insert(resolved.key()) {
                        check.rejection = Some(LineRejection::DuplicateLine);
                    }
                }
            }
            checked.push(check);
        }
        Ok(checked)
    }

    async fn check_line(&self, line: &CartLine, session_id: &str) -> BookingResult<CheckedLine> {
        match line {
            CartLine::Room {
                room,
                date,
                start,
                end,
                price_cents,
            } => {
                let Some(room) = self.catalog.resolve(room) else {
                    return Ok(CheckedLine::rejected(LineRejection::UnknownRoom));
                };
                if !room.active {
                    return Ok(CheckedLine::rejected(LineRejection::RoomInactive));
                }
                let expected = self.rates.room_slot_price(room);
                let resolved = ResolvedLine {
                    room_id: room.id,
                    event_id: None,
                    date: *date,
                    start: *start,
                    end: *end,
                    price_cents: expected,
                };
                let window_ok = room
                    .daily_slots()
                    .iter()
                    .any(|window| window.start == *start && window.end == *end);
                let rejection = self
                    .common_checks(&resolved, window_ok, *price_cents, expected, session_id)
                    .await?;
                Ok(CheckedLine {
                    resolved: Some(resolved),
                    rejection,
                })
            }
            CartLine::Event {
                event_id,
                date,
                start,
                end,
                price_cents,
            } => {
                let event: Option<SpecialEvent> = self
                    .events
                    .find_active(*event_id)
                    .await
                    .map_err(BookingError::store)?;
                let Some(event) = event else {
                    return Ok(CheckedLine::rejected(LineRejection::UnknownEvent));
                };
                if !event.covers(*date) {
                    return Ok(CheckedLine::rejected(LineRejection::OutsideEventDates));
                }
                let expected = self.rates.event_slot_price(&event);
                let resolved = ResolvedLine {
                    room_id: event.room_id,
                    event_id: Some(event.id),
                    date: *date,
                    start: *start,
                    end: *end,
                    price_cents: expected,
                };
                let window_ok = event
                    .daily_slots()
                    .iter()
                    .any(|window| window.start == *start && window.end == *end);
                let rejection = self
                    .common_checks(&resolved, window_ok, *price_cents, expected, session_id)
                    .await?;
                Ok(CheckedLine {
                    resolved: Some(resolved),
                    rejection,
                })
            }
        }
    }

    /// Checks shared by both line kinds, cheapest first. Occupancy
    /// goes last since it costs a storage read.
    async fn common_checks(
        &self,
        resolved: &ResolvedLine,
        window_ok: bool,
        client_price: i64,
        expected_price: i64,
        session_id: &str,
    ) -> BookingResult<Option<LineRejection>> {
        if !window_ok {
            return Ok(Some(LineRejection::InvalidWindow));
        }
        if self.clock.slot_has_started(resolved.date, resolved.start) {
            return Ok(Some(LineRejection::SlotInPast));
        }
        if client_price != expected_price {
            return Ok(Some(LineRejection::PriceMismatch {
                expected_cents: expected_price,
            }));
        }
        let occupied = self
            .availability
            .slot_occupied(
                resolved.room_id,
                resolved.date,
                resolved.start,
                self.clock.now_utc(),
                Some(session_id),
            )
            .await
            .map_err(BookingError::store)?;
        if occupied {
            return Ok(Some(LineRejection::SlotTaken));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use backline_core::BoxError;
    use backline_reservation::OccupiedSlot;
    use backline_catalog::Room;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeEventStore {
        events: Vec<SpecialEvent>,
    }

    #[async_trait]
    impl SpecialEventStore for FakeEventStore {
        async fn find_active(&self, id: Uuid) -> Result<Option<SpecialEvent>, BoxError> {
            Ok(self
                .events
                .iter()
                .find(|event| event.id == id && event.active)
                .cloned())
        }

        async fn list_active(&self) -> Result<Vec<SpecialEvent>, BoxError> {
            Ok(self.events.iter().filter(|e| e.active).cloned().collect())
        }
    }

    #[derive(Default)]
    struct FakeOccupancy {
        committed: Mutex<HashSet<SlotKey>>,
        holds: Mutex<HashMap<SlotKey, String>>,
    }

    impl FakeOccupancy {
        fn commit(&self, key: SlotKey) {
            self.committed.lock().unwrap().insert(key);
        }

        fn hold(&self, key: SlotKey, session: &str) {
            self.holds.lock().unwrap().insert(key, session.to_string());
        }
    }

    #[async_trait]
    impl AvailabilityStore for FakeOccupancy {
        async fn occupancy_for_day(
            &self,
            _date: NaiveDate,
            _now: DateTime<Utc>,
        ) -> Result<Vec<OccupiedSlot>, BoxError> {
            Ok(Vec::new())
        }

        async fn slot_occupied(
            &self,
            room_id: Uuid,
            date: NaiveDate,
            start: NaiveTime,
            _now: DateTime<Utc>,
            exclude_session: Option<&str>,
        ) -> Result<bool, BoxError> {
            let key = SlotKey::new(room_id, date, start);
            if self.committed.lock().unwrap().contains(&key) {
                return Ok(true);
            }
            if let Some(owner) = self.holds.lock().unwrap().get(&key) {
                return Ok(exclude_session != Some(owner.as_str()));
            }
            Ok(false)
        }
    }

    fn studio_a() -> Room {
        Room {
            id: Uuid::new_v4(),
            slug: "studio-a".into(),
            name: "Studio A".into(),
            active: true,
            open_hour: 8,
            close_hour: 22,
            hourly_rate_cents: 3500,
        }
    }

    fn validator(
        rooms: Vec<Room>,
        events: Vec<SpecialEvent>,
        occupancy: Arc<FakeOccupancy>,
    ) -> CartValidator {
        CartValidator::new(
            Arc::new(Catalog::new(rooms)),
            Arc::new(FakeEventStore { events }),
            occupancy,
            RateCard::new("EUR"),
            BusinessClock::fixed(
                chrono_tz::Europe::Berlin,
                Utc.with_ymd_and_hms(2025, 6, 9, 12, 0, 0).unwrap(),
            ),
        )
    }

    fn room_line(slug: &str, hour: u32, price: i64) -> CartLine {
        CartLine::Room {
            room: RoomRef::Slug(slug.into()),
            date: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            start: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(hour + 1, 0, 0).unwrap(),
            price_cents: price,
        }
    }

    #[tokio::test]
    async fn every_line_is_judged() {
        let occupancy = Arc::new(FakeOccupancy::default());
        let validator = validator(vec![studio_a()], vec![], occupancy);

        let cart = vec![
            room_line("studio-a", 8, 3500),
            room_line("studio-z", 9, 3500),
            room_line("studio-a", 10, 2000),
        ];
        let review = validator.review(&cart, "guest-one").await.unwrap();

        assert!(!review.all_valid);
        assert_eq!(review.lines.len(), 3);
        assert!(review.lines[0].valid);
        assert_eq!(review.lines[1].rejection, Some(LineRejection::UnknownRoom));
        assert_eq!(
            review.lines[2].rejection,
            Some(LineRejection::PriceMismatch {
                expected_cents: 3500
            })
        );
        // Only the valid line counts toward the total.
        assert_eq!(review.total_cents, 3500);
        assert_eq!(review.currency, "EUR");
    }

    #[tokio::test]
    async fn own_hold_does_not_block_the_cart() {
        let occupancy = Arc::new(FakeOccupancy::default());
        let room = studio_a();
        let key = SlotKey::new(
            room.id,
            NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        );
        occupancy.hold(key, "guest-one");
        let validator = validator(vec![room], vec![], occupancy);

        let cart = vec![room_line("studio-a", 8, 3500)];
        let mine = validator.review(&cart, "guest-one").await.unwrap();
        assert!(mine.all_valid);

        let theirs = validator.review(&cart, "guest-two").await.unwrap();
        assert!(!theirs.all_valid);
        assert_eq!(theirs.lines[0].rejection, Some(LineRejection::SlotTaken));
    }

    #[tokio::test]
    async fn committed_booking_blocks_everyone() {
        let occupancy = Arc::new(FakeOccupancy::default());
        let room = studio_a();
        occupancy.commit(SlotKey::new(
            room.id,
            NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        ));
        let validator = validator(vec![room], vec![], occupancy);

        let review = validator
            .review(&[room_line("studio-a", 8, 3500)], "guest-one")
            .await
            .unwrap();
        assert_eq!(review.lines[0].rejection, Some(LineRejection::SlotTaken));
    }

    #[tokio::test]
    async fn past_and_off_schedule_slots_are_rejected() {
        let occupancy = Arc::new(FakeOccupancy::default());
        let validator = validator(vec![studio_a()], vec![], occupancy);

        let past = CartLine::Room {
            room: RoomRef::Slug("studio-a".into()),
            date: NaiveDate::from_ymd_opt(2025, 6, 8).unwrap(),
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            price_cents: 3500,
        };
        let off_schedule = CartLine::Room {
            room: RoomRef::Slug("studio-a".into()),
            date: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            start: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            end: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            price_cents: 3500,
        };

        let review = validator
            .review(&[past, off_schedule], "guest-one")
            .await
            .unwrap();
        assert_eq!(review.lines[0].rejection, Some(LineRejection::SlotInPast));
        assert_eq!(
            review.lines[1].rejection,
            Some(LineRejection::InvalidWindow)
        );
    }

    #[tokio::test]
    async fn duplicate_slot_in_one_cart_is_rejected() {
        let occupancy = Arc::new(FakeOccupancy::default());
        let validator = validator(vec![studio_a()], vec![], occupancy);

        let review = validator
            .review(
                &[room_line("studio-a", 8, 3500), room_line("studio-a", 8, 3500)],
                "guest-one",
            )
            .await
            .unwrap();
        assert!(review.lines[0].valid);
        assert_eq!(
            review.lines[1].rejection,
            Some(LineRejection::DuplicateLine)
        );
    }

    #[tokio::test]
    async fn event_lines_are_checked_against_the_event() {
        let occupancy = Arc::new(FakeOccupancy::default());
        let room = studio_a();
        let event = SpecialEvent {
            id: Uuid::new_v4(),
            slug: "june-sessions".into(),
            title: "June Sessions".into(),
            room_id: room.id,
            start_date: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 12).unwrap(),
            start_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            slot_minutes: 90,
            price_cents: 5000,
            active: true,
        };
        let event_id = event.id;
        let validator = validator(vec![room], vec![event], occupancy);

        let valid = CartLine::Event {
            event_id,
            date: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            start: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
            price_cents: 5000,
        };
        let outside = CartLine::Event {
            event_id,
            date: NaiveDate::from_ymd_opt(2025, 6, 13).unwrap(),
            start: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
            price_cents: 5000,
        };
        let unknown = CartLine::Event {
            event_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            start: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
            price_cents: 5000,
        };

        let review = validator
            .review(&[valid, outside, unknown], "guest-one")
            .await
            .unwrap();
        assert!(review.lines[0].valid);
        assert_eq!(
            review.lines[1].rejection,
            Some(LineRejection::OutsideEventDates)
        );
        assert_eq!(review.lines[2].rejection, Some(LineRejection::UnknownEvent));
        assert_eq!(review.total_cents, 5000);
    }

    #[tokio::test]
    async fn checkout_resolution_rejects_bad_carts() {
        let occupancy = Arc::new(FakeOccupancy::default());
        let validator = validator(vec![studio_a()], vec![], occupancy);

        let resolved = validator
            .resolve_for_checkout(&[room_line("studio-a", 8, 3500)], "guest-one")
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].price_cents, 3500);

        let err = validator
            .resolve_for_checkout(&[room_line("studio-z", 8, 3500)], "guest-one")
            .await;
        assert!(matches!(err, Err(BookingError::ValidationFailed(_))));
    }
}
