pub mod clock;
pub mod error;
pub mod invoice;
pub mod notify;
pub mod payment;
pub mod slot;
pub mod snapshot;

pub use clock::BusinessClock;
pub use error::{BookingError, BookingResult};
pub use slot::SlotKey;

/// Boxed error alias used across the repository seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
