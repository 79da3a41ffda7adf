use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::errors::{unique_violation, OPEN_PLATE_CONSTRAINT, OPEN_SLOT_CONSTRAINT};
use super::{SessionStore, StoreError};
use crate::constants::API_NAME;
use crate::models::{
    generate_booking_id, DailyStats, EntryRecord, NewBooking, ParkingSession, PlateNumber,
};

const SESSION_COLUMNS: &str = "id, plate, booking_id, name, phone, booking_time, entry_time, \
                               exit_time, slot, bill_amount";

/// Claim/insert/inspect rounds before giving up on a plate that keeps changing.
const ENTRY_ROUNDS: usize = 3;

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn claim_booking(
        &self,
        plate: &PlateNumber,
        at: DateTime<Utc>,
    ) -> Result<Option<ParkingSession>, sqlx::Error> {
        let query = format!(
            "UPDATE parking_sessions SET entry_time = $2 \
             WHERE plate = $1 AND exit_time IS NULL AND entry_time IS NULL \
             RETURNING {}",
            SESSION_COLUMNS
        );
        sqlx::query_as::<_, ParkingSession>(&query)
            .bind(plate.as_str())
            .bind(at)
            .fetch_optional(&self.pool)
            .await
    }

    async fn insert_walk_in(
        &self,
        plate: &PlateNumber,
        at: DateTime<Utc>,
    ) -> Result<Option<ParkingSession>, sqlx::Error> {
        let query = format!(
            "INSERT INTO parking_sessions (plate, booking_id, entry_time) VALUES ($1, $2, $3) \
             ON CONFLICT (plate) WHERE exit_time IS NULL DO NOTHING \
             RETURNING {}",
            SESSION_COLUMNS
        );
        sqlx::query_as::<_, ParkingSession>(&query)
            .bind(plate.as_str())
            .bind(generate_booking_id(at))
            .bind(at)
            .fetch_optional(&self.pool)
            .await
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn find_open(&self, plate: &PlateNumber) -> Result<Option<ParkingSession>, StoreError> {
        let query = format!(
            "SELECT {} FROM parking_sessions WHERE plate = $1 AND exit_time IS NULL",
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, ParkingSession>(&query)
            .bind(plate.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn create_booking(&self, booking: &NewBooking) -> Result<ParkingSession, StoreError> {
        let query = format!(
            "INSERT INTO parking_sessions (plate, booking_id, name, phone, booking_time) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            SESSION_COLUMNS
        );
        sqlx::query_as::<_, ParkingSession>(&query)
            .bind(booking.plate.as_str())
            .bind(&booking.booking_id)
            .bind(&booking.name)
            .bind(&booking.phone)
            .bind(booking.booked_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match unique_violation(&e).as_deref() {
                Some(OPEN_PLATE_CONSTRAINT) => {
                    StoreError::OpenSessionExists(booking.plate.to_string())
                }
                _ => StoreError::Database(e),
            })
    }

    async fn record_entry(
        &self,
        plate: &PlateNumber,
        at: DateTime<Utc>,
    ) -> Result<EntryRecord, StoreError> {
        for round in 0..ENTRY_ROUNDS {
            if let Some(session) = self.claim_booking(plate, at).await? {
                return Ok(EntryRecord::Claimed(session));
            }
            if let Some(session) = self.insert_walk_in(plate, at).await? {
                return Ok(EntryRecord::Created(session));
            }
            // The insert hit the open-plate index: either the car is inside
            // or a booking appeared between the two statements.
            match self.find_open(plate).await? {
                Some(session) if session.has_entered() => {
                    return Ok(EntryRecord::AlreadyParked(session));
                }
                _ => {
                    tracing::debug!(
                        "{} Open session for {} changed during entry, round {}",
                        API_NAME,
                        plate,
                        round + 1
                    );
                }
            }
        }
        Err(StoreError::Contended(plate.to_string()))
    }

    async fn record_exit(
        &self,
        session_id: i64,
        at: DateTime<Utc>,
        bill_amount: i64,
    ) -> Result<Option<ParkingSession>, StoreError> {
        let query = format!(
            "UPDATE parking_sessions SET exit_time = $2, bill_amount = $3 \
             WHERE id = $1 AND exit_time IS NULL \
             RETURNING {}",
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, ParkingSession>(&query)
            .bind(session_id)
            .bind(at)
            .bind(bill_amount)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn assign_slot(
        &self,
        plate: &PlateNumber,
        slot: i32,
    ) -> Result<ParkingSession, StoreError> {
        let query = format!(
            "UPDATE parking_sessions SET slot = $2 \
             WHERE plate = $1 AND exit_time IS NULL \
             RETURNING {}",
            SESSION_COLUMNS
        );
        let updated = sqlx::query_as::<_, ParkingSession>(&query)
            .bind(plate.as_str())
            .bind(slot)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| match unique_violation(&e).as_deref() {
                Some(OPEN_SLOT_CONSTRAINT) => StoreError::SlotTaken(slot),
                _ => StoreError::Database(e),
            })?;
        updated.ok_or_else(|| StoreError::NotFound(plate.to_string()))
    }

    async fn list_open(&self) -> Result<Vec<ParkingSession>, StoreError> {
        let query = format!(
            "SELECT {} FROM parking_sessions WHERE exit_time IS NULL ORDER BY id",
            SESSION_COLUMNS
        );
        let sessions = sqlx::query_as::<_, ParkingSession>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(sessions)
    }

    async fn count_occupied_slots(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM parking_sessions WHERE exit_time IS NULL AND slot IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn daily_stats(&self, since: DateTime<Utc>) -> Result<DailyStats, StoreError> {
        let stats = sqlx::query_as::<_, DailyStats>(
            "SELECT \
               COUNT(*) FILTER (WHERE entry_time >= $1) AS today_entries, \
               COUNT(*) FILTER (WHERE exit_time IS NULL AND entry_time IS NOT NULL) AS currently_parked, \
               COUNT(*) FILTER (WHERE exit_time >= $1) AS exited_today, \
               COALESCE(SUM(bill_amount) FILTER (WHERE exit_time >= $1), 0)::BIGINT AS revenue_today \
             FROM parking_sessions",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}
