use axum::{
    extract::{Path, State},
    Json,
};
use backline_catalog::SpecialEvent;
use backline_core::BookingError;
use backline_reservation::EventDay;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct EventSummary {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub room_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_minutes: u32,
    pub price_cents: i64,
}

impl From<&SpecialEvent> for EventSummary {
    fn from(event: &SpecialEvent) -> Self {
        Self {
            id: event.id,
            slug: event.slug.clone(),
            title: event.title.clone(),
            room_id: event.room_id,
            start_date: event.start_date,
            end_date: event.end_date,
            start_time: event.start_time,
            end_time: event.end_time,
            slot_minutes: event.slot_minutes,
            price_cents: event.price_cents,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventAvailabilityResponse {
    pub event: EventSummary,
    pub days: Vec<EventDay>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/events
pub async fn list_events(
    State(state): State<AppState>,
) -> Result<Json<Vec<EventSummary>>, AppError> {
    let events = state
        .events
        .list_active()
        .await
        .map_err(BookingError::store)?;

    Ok(Json(events.iter().map(EventSummary::from).collect()))
}

/// GET /v1/events/{id}/availability
/// Event-priced slot grid over the event's date range.
pub async fn event_availability(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventAvailabilityResponse>, AppError> {
    let event = state
        .events
        .find_active(event_id)
        .await
        .map_err(BookingError::store)?
        .ok_or_else(|| BookingError::NotFound("event".to_string()))?;

    let days = state.availability.project_event(&event).await?;

    Ok(Json(EventAvailabilityResponse {
        event: EventSummary::from(&event),
        days,
    }))
}
