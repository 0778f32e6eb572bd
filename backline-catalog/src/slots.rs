use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

/// A half-open booking window `[start, end)` within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTime {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Generate the whole-hour slots of a room open `[open_hour, close_hour)`.
///
/// Pure and deterministic. A close hour of 24 yields a final slot ending
/// at midnight (represented as 00:00). Inverted or equal hours yield an
/// empty schedule.
pub fn hourly_slots(open_hour: u32, close_hour: u32) -> Vec<SlotTime> {
    if open_hour >= close_hour || close_hour > 24 {
        return Vec::new();
    }
    (open_hour..close_hour)
        .filter_map(|hour| {
            let start = NaiveTime::from_hms_opt(hour, 0, 0)?;
            let end = NaiveTime::from_hms_opt((hour + 1) % 24, 0, 0)?;
            Some(SlotTime { start, end })
        })
        .collect()
}

/// Generate fixed-length slots of `slot_minutes` between `start` and
/// `end`, truncating a final interval that would overrun `end`.
///
/// Pure and deterministic. Zero-length slots produce an empty schedule.
pub fn event_slots(start: NaiveTime, end: NaiveTime, slot_minutes: u32) -> Vec<SlotTime> {
    if slot_minutes == 0 || start >= end {
        return Vec::new();
    }
    let step = Duration::minutes(slot_minutes as i64);
    let mut slots = Vec::new();
    let mut cursor = start;
    loop {
        let (next, wrapped) = cursor.overflowing_add_signed(step);
        if wrapped != 0 || next > end {
            break;
        }
        slots.push(SlotTime {
            start: cursor,
            end: next,
        });
        cursor = next;
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn hourly_slots_cover_opening_hours() {
        let slots = hourly_slots(8, 22);
        assert_eq!(slots.len(), 14);
        assert_eq!(slots[0], SlotTime { start: t(8, 0), end: t(9, 0) });
        assert_eq!(slots[13], SlotTime { start: t(21, 0), end: t(22, 0) });
    }

    #[test]
    fn hourly_slots_are_deterministic() {
        assert_eq!(hourly_slots(8, 22), hourly_slots(8, 22));
    }

    #[test]
    fn hourly_slots_handle_midnight_close() {
        let slots = hourly_slots(22, 24);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1], SlotTime { start: t(23, 0), end: t(0, 0) });
    }

    #[test]
    fn inverted_hours_yield_nothing() {
        assert!(hourly_slots(22, 8).is_empty());
        assert!(hourly_slots(10, 10).is_empty());
    }

    #[test]
    fn event_slots_truncate_partial_final_interval() {
        // 150 minutes of range in 45-minute slots: the fourth would
        // overrun, so only three fit.
        let slots = event_slots(t(10, 0), t(12, 30), 45);
        assert_eq!(
            slots,
            vec![
                SlotTime { start: t(10, 0), end: t(10, 45) },
                SlotTime { start: t(10, 45), end: t(11, 30) },
                SlotTime { start: t(11, 30), end: t(12, 15) },
            ]
        );
    }

    #[test]
    fn event_slots_exact_fit() {
        let slots = event_slots(t(18, 0), t(20, 0), 30);
        assert_eq!(slots.len(), 4);
        assert_eq!(slots[3], SlotTime { start: t(19, 30), end: t(20, 0) });
    }

    #[test]
    fn zero_length_slots_yield_nothing() {
        assert!(event_slots(t(10, 0), t(12, 0), 0).is_empty());
    }
}
