use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, warn};

/// Deletes expired holds on an interval. Hygiene only: every read
/// already filters on `expires_at`, so a missed sweep costs table
/// bloat, never correctness.
pub async fn run_hold_sweeper(pool: PgPool, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        match sqlx::query("DELETE FROM slot_holds WHERE expires_at <= now()")
            .execute(&pool)
            .await
        {
            Ok(result) if result.rows_affected() > 0 => {
                debug!(swept = result.rows_affected(), "expired holds removed");
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "hold sweep failed, will retry next tick");
            }
        }
    }
}
