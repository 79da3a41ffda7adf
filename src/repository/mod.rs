//! Persistence of parking sessions.
//!
//! Every operation on [`SessionStore`] is atomic on its own. The "one open
//! session per plate" rule is enforced by the store, not by callers checking
//! first and writing afterwards.

pub mod errors;
pub mod memory;
pub mod session_repo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{DailyStats, EntryRecord, NewBooking, ParkingSession, PlateNumber};

pub use errors::StoreError;
pub use memory::InMemorySessionStore;
pub use session_repo::PgSessionStore;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_open(&self, plate: &PlateNumber) -> Result<Option<ParkingSession>, StoreError>;

    /// Fails with [`StoreError::OpenSessionExists`] when the plate is already open.
    async fn create_booking(&self, booking: &NewBooking) -> Result<ParkingSession, StoreError>;

    /// Claims an open booking or creates a walk-in session with `entry_time = at`.
    async fn record_entry(
        &self,
        plate: &PlateNumber,
        at: DateTime<Utc>,
    ) -> Result<EntryRecord, StoreError>;

    /// Closes the session if it is still open. `None` means someone else closed it.
    async fn record_exit(
        &self,
        session_id: i64,
        at: DateTime<Utc>,
        bill_amount: i64,
    ) -> Result<Option<ParkingSession>, StoreError>;

    async fn assign_slot(&self, plate: &PlateNumber, slot: i32)
        -> Result<ParkingSession, StoreError>;

    async fn list_open(&self) -> Result<Vec<ParkingSession>, StoreError>;

    async fn count_occupied_slots(&self) -> Result<i64, StoreError>;

    async fn daily_stats(&self, since: DateTime<Utc>) -> Result<DailyStats, StoreError>;
}
