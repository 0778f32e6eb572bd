use async_trait::async_trait;
use backline_catalog::{Catalog, RoomRef};
use backline_core::{BookingError, BookingResult, BoxError, BusinessClock, SlotKey};
use backline_shared::models::events::{HoldCreatedEvent, HoldReleasedEvent};
use backline_shared::BookingTelemetry;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A temporary reservation: one session parking one slot while the
/// customer completes checkout. Dead once `expires_at` passes; readers
/// filter on expiry, they never wait for cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotHold {
    pub id: Uuid,
    pub room_id: Uuid,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SlotHold {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.room_id, self.slot_date, self.start_time)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// How long a fresh or refreshed hold lives.
#[derive(Debug, Clone, Copy)]
pub struct HoldPolicy {
    ttl: Duration,
}

impl HoldPolicy {
    pub fn from_minutes(minutes: i64) -> Self {
        Self {
            ttl: Duration::minutes(minutes),
        }
    }

    pub fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.ttl
    }
}

/// What an atomic claim attempt resolved to.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// The slot is ours, fresh or refreshed.
    Claimed(SlotHold),
    /// Another session holds an unexpired hold on the slot.
    HeldByOther,
    /// A live order item already occupies the slot.
    SlotBooked,
}

/// Storage boundary for holds. `try_claim` is the single serialization
/// point for slot contention: implementations must check committed
/// order items and perform the conditional upsert atomically, so two
/// racing claims can never both succeed.
#[async_trait]
pub trait HoldStore: Send + Sync {
    async fn try_claim(
        &self,
        key: &SlotKey,
        session_id: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<ClaimOutcome, BoxError>;

    /// Delete the session's hold on the slot. `false` when there was
    /// nothing to delete.
    async fn release(&self, key: &SlotKey, session_id: &str) -> Result<bool, BoxError>;

    /// Push out the expiry of the session's live hold. `None` when the
    /// session has no live hold on the slot.
    async fn extend(
        &self,
        key: &SlotKey,
        session_id: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<SlotHold>, BoxError>;

    /// The session's live holds, ordered by date then start time.
    async fn list_for_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<SlotHold>, BoxError>;
}

/// Hold lifecycle operations behind the HTTP surface. Validates the
/// slot against the catalog and clock, then delegates contention to
/// the store's atomic claim.
pub struct HoldManager {
    store: Arc<dyn HoldStore>,
    catalog: Arc<Catalog>,
    clock: BusinessClock,
    policy: HoldPolicy,
    telemetry: BookingTelemetry,
}

impl HoldManager {
    pub fn new(
        store: Arc<dyn HoldStore>,
        catalog: Arc<Catalog>,
        clock: BusinessClock,
        policy: HoldPolicy,
        telemetry: BookingTelemetry,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
            policy,
            telemetry,
        }
    }

    /// Create a hold, or refresh it when the session already owns one.
    pub async fn create(
        &self,
        room_ref: &RoomRef,
        date: NaiveDate,
        start: NaiveTime,
        session_id: &str,
    ) -> BookingResult<SlotHold> {
        let key = self.checked_slot(room_ref, date, start)?;
        if self.clock.slot_has_started(date, start) {
            return Err(BookingError::ValidationFailed(
                "slot is in the past".to_string(),
            ));
        }

        let now = self.clock.now_utc();
        let expires_at = self.policy.expiry_from(now);
        let outcome = self
            .store
            .try_claim(&key, session_id, now, expires_at)
            .await
            .map_err(BookingError::store)?;

        match outcome {
            ClaimOutcome::Claimed(hold) => {
                self.telemetry.log_hold_created(HoldCreatedEvent {
                    room_id: hold.room_id,
                    slot_date: hold.slot_date,
                    start_time: hold.start_time,
                    session_id: hold.session_id.clone(),
                    expires_at: hold.expires_at.timestamp(),
                });
                Ok(hold)
            }
            ClaimOutcome::HeldByOther | ClaimOutcome::SlotBooked => {
                Err(BookingError::SlotUnavailable(key))
            }
        }
    }

    /// Release the session's hold. Releasing a slot the session does
    /// not hold is a no-op.
    pub async fn remove(
        &self,
        room_ref: &RoomRef,
        date: NaiveDate,
        start: NaiveTime,
        session_id: &str,
    ) -> BookingResult<bool> {
        let key = self.resolved_key(room_ref, date, start)?;
        let released = self
            .store
            .release(&key, session_id)
            .await
            .map_err(BookingError::store)?;
        if released {
            self.telemetry.log_hold_released(HoldReleasedEvent {
                room_id: key.room_id,
                slot_date: key.date,
                start_time: key.start,
                session_id: session_id.to_string(),
            });
        }
        Ok(released)
    }

    /// Push out the expiry of an existing live hold.
    pub async fn extend(
        &self,
        room_ref: &RoomRef,
        date: NaiveDate,
        start: NaiveTime,
        session_id: &str,
    ) -> BookingResult<SlotHold> {
        let key = self.resolved_key(room_ref, date, start)?;
        let now = self.clock.now_utc();
        let expires_at = self.policy.expiry_from(now);
        self.store
            .extend(&key, session_id, now, expires_at)
            .await
            .map_err(BookingError::store)?
            .ok_or_else(|| BookingError::NotFound("hold".to_string()))
    }

    /// The session's live holds.
    pub async fn list(&self, session_id: &str) -> BookingResult<Vec<SlotHold>> {
        self.store
            .list_for_session(session_id, self.clock.now_utc())
            .await
            .map_err(BookingError::store)
    }

    /// Resolve the room and verify the slot exists on its schedule.
    fn checked_slot(
        &self,
        room_ref: &RoomRef,
        date: NaiveDate,
        start: NaiveTime,
    ) -> BookingResult<SlotKey> {
        let room = self
            .catalog
            .resolve(room_ref)
            .ok_or_else(|| BookingError::NotFound("room".to_string()))?;
        if !room.active {
            return Err(BookingError::ValidationFailed(
                "room is not bookable".to_string(),
            ));
        }
        if !room.daily_slots().iter().any(|slot| slot.start == start) {
            return Err(BookingError::ValidationFailed(
                "start time is not a bookable slot".to_string(),
            ));
        }
        Ok(SlotKey::new(room.id, date, start))
    }

    /// Resolve the room without schedule checks; release and extend
    /// target an existing hold, not a fresh claim.
    fn resolved_key(
        &self,
        room_ref: &RoomRef,
        date: NaiveDate,
        start: NaiveTime,
    ) -> BookingResult<SlotKey> {
        let room = self
            .catalog
            .resolve(room_ref)
            .ok_or_else(|| BookingError::NotFound("room".to_string()))?;
        Ok(SlotKey::new(room.id, date, start))
    }
}
