use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

/// Source of "now" for a [`BusinessClock`].
///
/// Production code uses [`ClockSource::System`]; tests pin a
/// [`ClockSource::Fixed`] instant so past/future slot classification is
/// deterministic.
#[derive(Debug, Clone, Copy)]
pub enum ClockSource {
    System,
    Fixed(DateTime<Utc>),
}

/// Supplies "now" and "today" in the single business timezone.
///
/// Server hosts and browsers run in arbitrary locales; every decision about
/// whether a slot lies in the past must go through this adapter, never
/// through the host clock directly.
#[derive(Debug, Clone, Copy)]
pub struct BusinessClock {
    tz: Tz,
    source: ClockSource,
}

impl BusinessClock {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            source: ClockSource::System,
        }
    }

    /// A clock frozen at `instant`, for tests.
    pub fn fixed(tz: Tz, instant: DateTime<Utc>) -> Self {
        Self {
            tz,
            source: ClockSource::Fixed(instant),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        match self.source {
            ClockSource::System => Utc::now(),
            ClockSource::Fixed(instant) => instant,
        }
    }

    /// Current instant in the business timezone.
    pub fn now(&self) -> DateTime<Tz> {
        self.now_utc().with_timezone(&self.tz)
    }

    /// Current business date (the instant truncated to its calendar day).
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Whether a slot starting at `start` on `date` counts as passed.
    ///
    /// The boundary is inclusive: a slot starting exactly at the current
    /// wall-clock time is already gone, so at 14:30 the 14:00 slot is past
    /// while the 15:00 slot is still bookable.
    pub fn slot_has_started(&self, date: NaiveDate, start: NaiveTime) -> bool {
        let now = self.now();
        let today = now.date_naive();
        if date < today {
            return true;
        }
        if date > today {
            return false;
        }
        start <= now.time()
    }
}
