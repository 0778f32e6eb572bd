use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use backline_core::BookingError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    Booking(BookingError),
    AuthenticationError(String),
    AuthorizationError(String),
    BadRequest(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Booking(err) => booking_response(err),
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Domain errors carry their own client-facing wording; storage and
/// code-allocation failures stay opaque.
fn booking_response(err: BookingError) -> (StatusCode, String) {
    match &err {
        BookingError::SlotUnavailable(_) | BookingError::InvalidTransition { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        BookingError::ValidationFailed(_) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        BookingError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        BookingError::UpstreamPayment(_) => {
            tracing::error!("Payment provider failure: {}", err);
            (
                StatusCode::BAD_GATEWAY,
                "payment provider unavailable".to_string(),
            )
        }
        BookingError::CodeCollision | BookingError::Store(_) => {
            tracing::error!("Internal Server Error: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            )
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        Self::Booking(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}
