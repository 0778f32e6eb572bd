use axum::{extract::State, http::StatusCode, Extension, Json};
use backline_catalog::RoomRef;
use backline_reservation::SlotHold;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, middleware::auth::SessionClaims, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HoldRequest {
    pub room: RoomRef,
    pub date: NaiveDate,
    pub start: NaiveTime,
}

#[derive(Debug, Serialize)]
pub struct HoldResponse {
    pub room_id: Uuid,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub expires_at: DateTime<Utc>,
}

impl From<SlotHold> for HoldResponse {
    fn from(hold: SlotHold) -> Self {
        Self {
            room_id: hold.room_id,
            slot_date: hold.slot_date,
            start_time: hold.start_time,
            expires_at: hold.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub released: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/holds
/// Claim a slot for the session. Re-claiming an own live hold refreshes its
/// expiry; a slot held by another session or already sold is a 409.
pub async fn create_hold(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Json(req): Json<HoldRequest>,
) -> Result<(StatusCode, Json<HoldResponse>), AppError> {
    let hold = state
        .holds
        .create(&req.room, req.date, req.start, &claims.sub)
        .await?;

    Ok((StatusCode::CREATED, Json(HoldResponse::from(hold))))
}

/// DELETE /v1/holds
/// Releasing a slot the session does not hold reports released=false.
pub async fn release_hold(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Json(req): Json<HoldRequest>,
) -> Result<Json<ReleaseResponse>, AppError> {
    let released = state
        .holds
        .remove(&req.room, req.date, req.start, &claims.sub)
        .await?;

    Ok(Json(ReleaseResponse { released }))
}

/// POST /v1/holds/extend
/// Push out the expiry of a live own hold. Expired or foreign holds are 404.
pub async fn extend_hold(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Json(req): Json<HoldRequest>,
) -> Result<Json<HoldResponse>, AppError> {
    let hold = state
        .holds
        .extend(&req.room, req.date, req.start, &claims.sub)
        .await?;

    Ok(Json(HoldResponse::from(hold)))
}

/// GET /v1/holds
pub async fn list_holds(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Json<Vec<HoldResponse>>, AppError> {
    let holds = state.holds.list(&claims.sub).await?;

    Ok(Json(holds.into_iter().map(HoldResponse::from).collect()))
}
