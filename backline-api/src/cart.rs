use axum::{extract::State, http::HeaderMap, Json};
use backline_order::{CartLine, CartReview};
use serde::Deserialize;

use crate::{error::AppError, middleware::auth::bearer_session, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ValidateCartRequest {
    pub lines: Vec<CartLine>,
}

/// POST /v1/cart/validate
/// Public endpoint: a session token is honored when present so the caller's
/// own holds do not count against their cart, but none is required.
pub async fn validate_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ValidateCartRequest>,
) -> Result<Json<CartReview>, AppError> {
    let session = bearer_session(&headers, &state.auth.secret).unwrap_or_default();
    let review = state.cart.review(&req.lines, &session).await?;

    Ok(Json(review))
}
