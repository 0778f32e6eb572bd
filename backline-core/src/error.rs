use crate::slot::SlotKey;

/// Domain errors shared across the booking engine.
///
/// Each variant maps to one HTTP class at the API boundary; the service
/// layer never constructs status codes itself.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Slot {0} is no longer available")]
    SlotUnavailable(SlotKey),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Payment provider error: {0}")]
    UpstreamPayment(String),

    #[error("Could not allocate a unique check-in code")]
    CodeCollision,

    #[error("Storage error: {0}")]
    Store(#[source] crate::BoxError),
}

impl BookingError {
    /// Wrap an opaque storage failure.
    pub fn store<E>(err: E) -> Self
    where
        E: Into<crate::BoxError>,
    {
        Self::Store(err.into())
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
