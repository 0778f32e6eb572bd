use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use uuid::Uuid;

use crate::{error::AppError, middleware::auth::SessionClaims, state::AppState};

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    expires_in: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/guest", post(login_guest))
}

/// POST /v1/auth/guest
/// Anonymous browsing session. The subject doubles as the hold owner key,
/// so a new token means a fresh set of holds.
async fn login_guest(State(state): State<AppState>) -> Result<Json<AuthResponse>, AppError> {
    let claims = SessionClaims {
        sub: format!("guest-{}", Uuid::new_v4()),
        role: "GUEST".to_owned(),
        exp: (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.auth.secret.as_bytes()),
    )
    .map_err(|e| AppError::Anyhow(anyhow::anyhow!("Token encoding failed: {}", e)))?;

    Ok(Json(AuthResponse {
        token,
        expires_in: state.auth.expiration,
    }))
}
