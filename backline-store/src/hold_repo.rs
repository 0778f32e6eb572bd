use async_trait::async_trait;
use backline_core::{BoxError, SlotKey};
use backline_reservation::{ClaimOutcome, HoldStore, SlotHold};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Hold storage on the `slot_holds` table. The unique index on
/// `(room_id, slot_date, start_time)` plus the conditional upsert make
/// the claim atomic; two racing sessions get exactly one winner.
pub struct PgHoldStore {
    pool: PgPool,
}

impl PgHoldStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct HoldRow {
    id: Uuid,
    room_id: Uuid,
    slot_date: NaiveDate,
    start_time: NaiveTime,
    session_id: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<HoldRow> for SlotHold {
    fn from(row: HoldRow) -> Self {
        SlotHold {
            id: row.id,
            room_id: row.room_id,
            slot_date: row.slot_date,
            start_time: row.start_time,
            session_id: row.session_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

const HOLD_COLUMNS: &str = "id, room_id, slot_date, start_time, session_id, created_at, expires_at";

/// An item of an open or paid order already occupies the slot.
const COMMITTED_ITEM_SQL: &str = r#"
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
"#;

/// Insert wins on a free slot; the update arm fires only when the
/// existing hold is ours or expired. Zero rows back means a foreign
/// live hold kept the slot.
const CLAIM_SQL: &str = r#"
    INSERT INTO slot_holds (id, room_id, slot_date, start_time, session_id, created_at, expires_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (room_id, slot_date, start_time) DO UPDATE SET
        session_id = EXCLUDED.session_id,
        created_at = EXCLUDED.created_at,
        expires_at = EXCLUDED.expires_at
    WHERE slot_holds.session_id = EXCLUDED.session_id
       OR slot_holds.expires_at <= $6
    RETURNING id, room_id, slot_date, start_time, session_id, created_at, expires_at
"#;

#[async_trait]
impl HoldStore for PgHoldStore {
    async fn try_claim(
        &self,
        key: &SlotKey,
        session_id: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<ClaimOutcome, BoxError> {
        let mut tx = self.pool.begin().await?;

        let sold: bool = sqlx::query_scalar(COMMITTED_ITEM_SQL)
            .bind(key.room_id)
            .bind(key.date)
            .bind(key.start)
            .fetch_one(&mut *tx)
            .await?;
        if sold {
            return Ok(ClaimOutcome::SlotBooked);
        }

        let row: Option<HoldRow> = sqlx::query_as(CLAIM_SQL)
            .bind(Uuid::new_v4())
            .bind(key.room_id)
            .bind(key.date)
            .bind(key.start)
            .bind(session_id)
            .bind(now)
            .bind(expires_at)
            .fetch_optional(&mut *tx)
            .await?;

        match row {
            Some(row) => {
                tx.commit().await?;
                Ok(ClaimOutcome::Claimed(row.into()))
            }
            None => Ok(ClaimOutcome::HeldByOther),
        }
    }

    async fn release(&self, key: &SlotKey, session_id: &str) -> Result<bool, BoxError> {
        let result = sqlx::query(
            "DELETE FROM slot_holds
             WHERE room_id = $1 AND slot_date = $2 AND start_time = $3 AND session_id = $4",
        )
        .bind(key.room_id)
        .bind(key.date)
        .bind(key.start)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn extend(
        &self,
        key: &SlotKey,
        session_id: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<SlotHold>, BoxError> {
        let row: Option<HoldRow> = sqlx::query_as(&format!(
            "UPDATE slot_holds SET expires_at = $5
             WHERE room_id = $1 AND slot_date = $2 AND start_time = $3
               AND session_id = $4 AND expires_at > $6
             RETURNING {HOLD_COLUMNS}"
        ))
        .bind(key.room_id)
        .bind(key.date)
        .bind(key.start)
        .bind(session_id)
        .bind(expires_at)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SlotHold::from))
    }

    async fn list_for_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<SlotHold>, BoxError> {
        let rows: Vec<HoldRow> = sqlx::query_as(&format!(
            "SELECT {HOLD_COLUMNS} FROM slot_holds
             WHERE session_id = $1 AND expires_at > $2
             ORDER BY slot_date, start_time"
        ))
        .bind(session_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SlotHold::from).collect())
    }
}
