use async_trait::async_trait;
use backline_catalog::{SpecialEvent, SpecialEventStore};
use backline_core::BoxError;
use chrono::{NaiveDate, NaiveTime};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgSpecialEventStore {
    pool: PgPool,
}

impl PgSpecialEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    slug: String,
    title: String,
    room_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    slot_minutes: i32,
    price_cents: i64,
    active: bool,
}

impl From<EventRow> for SpecialEvent {
    fn from(row: EventRow) -> Self {
        SpecialEvent {
            id: row.id,
            slug: row.slug,
            title: row.title,
            room_id: row.room_id,
            start_date: row.start_date,
            end_date: row.end_date,
            start_time: row.start_time,
            end_time: row.end_time,
            slot_minutes: row.slot_minutes.max(0) as u32,
            price_cents: row.price_cents,
            active: row.active,
        }
    }
}

const EVENT_COLUMNS: &str = "id, slug, title, room_id, start_date, end_date, \
    start_time, end_time, slot_minutes, price_cents, active";

#[async_trait]
impl SpecialEventStore for PgSpecialEventStore {
    async fn find_active(&self, id: Uuid) -> Result<Option<SpecialEvent>, BoxError> {
        let row: Option<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM special_events WHERE id = $1 AND active"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SpecialEvent::from))
    }

    async fn list_active(&self) -> Result<Vec<SpecialEvent>, BoxError> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM special_events
             WHERE active ORDER BY start_date, start_time"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SpecialEvent::from).collect())
    }
}
