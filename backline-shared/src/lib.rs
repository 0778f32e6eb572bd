pub mod models;
pub mod pii;
pub mod telemetry;

pub use pii::Masked;
pub use telemetry::BookingTelemetry;
