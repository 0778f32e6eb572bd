use async_trait::async_trait;
use backline_core::BoxError;
use backline_reservation::{AvailabilityStore, OccupiedSlot};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Read side of the occupancy union: unexpired holds plus items of
/// pending or paid orders. No state of its own; every call is one
/// query against the live rows.
pub struct PgAvailabilityStore {
    pool: PgPool,
}

impl PgAvailabilityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OccupancyRow {
    room_id: Uuid,
    start_time: NaiveTime,
}

const DAY_OCCUPANCY_SQL: &str = r#"
    SELECT room_id, start_time
    FROM slot_holds
    WHERE slot_date = $1 AND expires_at > $2
    UNION ALL
    SELECT oi.room_id, oi.start_time
    FROM order_items oi
    JOIN orders o ON o.id = oi.order_id
    WHERE oi.slot_date = $1
      AND oi.status IN ('pending', 'booked')
      AND o.status IN ('pending', 'paid')
"#;

const SLOT_OCCUPIED_SQL: &str = r#"
    SELECT EXISTS (
        SELECT 1
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE oi.room_id = $1
          AND oi.slot_date = $2
          AND oi.start_time = $3
          AND oi.status IN ('pending', 'booked')
          AND o.status IN ('pending', 'paid')
    )
    OR EXISTS (
        SELECT 1
        FROM slot_holds
        WHERE room_id = $1
          AND slot_date = $2
          AND start_time = $3
          AND expires_at > $4
          AND ($5::text IS NULL OR session_id <> $5)
    )
"#;

/// Postgres undefined_table. Before the first migration has run the
/// calendar must still render, so an absent schema reads as empty
/// occupancy.
fn table_missing(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("42P01"),
        _ => false,
    }
}

#[async_trait]
impl AvailabilityStore for PgAvailabilityStore {
    async fn occupancy_for_day(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<OccupiedSlot>, BoxError> {
        let rows: Vec<OccupancyRow> = match sqlx::query_as(DAY_OCCUPANCY_SQL)
            .bind(date)
            .bind(now)
            .fetch_all(&self.pool)
            .await
        {
            Ok(rows) => rows,
            Err(err) if table_missing(&err) => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(rows
            .into_iter()
            .map(|row| OccupiedSlot {
                room_id: row.room_id,
                start_time: row.start_time,
            })
            .collect())
    }

    async fn slot_occupied(
        &self,
        room_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        now: DateTime<Utc>,
        exclude_session: Option<&str>,
    ) -> Result<bool, BoxError> {
        let occupied: bool = sqlx::query_scalar(SLOT_OCCUPIED_SQL)
            .bind(room_id)
            .bind(date)
            .bind(start)
            .bind(now)
            .bind(exclude_session)
            .fetch_one(&self.pool)
            .await?;

        Ok(occupied)
    }
}
