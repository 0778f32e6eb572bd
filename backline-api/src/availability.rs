use axum::{
    extract::{Query, State},
    Json,
};
use backline_reservation::RoomAvailability;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub date: NaiveDate,
    pub rooms: Vec<RoomAvailability>,
}

/// GET /v1/availability?date=2025-06-12
/// Slot grid for every active room on the date. Past dates come back fully
/// unavailable instead of erroring.
pub async fn day_availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let rooms = state.availability.project_day(query.date).await?;

    Ok(Json(AvailabilityResponse {
        date: query.date,
        rooms,
    }))
}
