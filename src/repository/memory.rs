use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{SessionStore, StoreError};
use crate::models::{
    generate_booking_id, DailyStats, EntryRecord, NewBooking, ParkingSession, PlateNumber,
};

/// Process-local store with the same invariants as the PostgreSQL one.
///
/// Each operation runs under a single lock, which gives it the atomicity the
/// partial unique indexes give the database.
#[derive(Default)]
pub struct InMemorySessionStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    sessions: Vec<ParkingSession>,
}

impl Inner {
    fn open_mut(&mut self, plate: &str) -> Option<&mut ParkingSession> {
        self.sessions
            .iter_mut()
            .find(|s| s.plate == plate && s.is_open())
    }

    fn push(&mut self, mut session: ParkingSession) -> ParkingSession {
        self.next_id += 1;
        session.id = self.next_id;
        self.sessions.push(session.clone());
        session
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a session as-is, bypassing the entry workflow. Test fixtures use
    /// it to seed sessions with arbitrary timestamps.
    pub fn insert_raw(&self, session: ParkingSession) -> ParkingSession {
        self.lock().push(session)
    }

    /// Every session ever stored, closed ones included.
    pub fn all(&self) -> Vec<ParkingSession> {
        self.lock().sessions.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn empty_session(plate: &PlateNumber, booking_id: String) -> ParkingSession {
    ParkingSession {
        id: 0,
        plate: plate.to_string(),
        booking_id,
        name: None,
        phone: None,
        booking_time: None,
        entry_time: None,
        exit_time: None,
        slot: None,
        bill_amount: None,
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn find_open(&self, plate: &PlateNumber) -> Result<Option<ParkingSession>, StoreError> {
        Ok(self.lock().open_mut(plate.as_str()).map(|s| s.clone()))
    }

    async fn create_booking(&self, booking: &NewBooking) -> Result<ParkingSession, StoreError> {
        let mut inner = self.lock();
        if inner.open_mut(booking.plate.as_str()).is_some() {
            return Err(StoreError::OpenSessionExists(booking.plate.to_string()));
        }
        let mut session = empty_session(&booking.plate, booking.booking_id.clone());
        session.name = Some(booking.name.clone());
        session.phone = Some(booking.phone.clone());
        session.booking_time = Some(booking.booked_at);
        Ok(inner.push(session))
    }

    async fn record_entry(
        &self,
        plate: &PlateNumber,
        at: DateTime<Utc>,
    ) -> Result<EntryRecord, StoreError> {
        let mut inner = self.lock();
        if let Some(open) = inner.open_mut(plate.as_str()) {
            if open.has_entered() {
                return Ok(EntryRecord::AlreadyParked(open.clone()));
            }
            open.entry_time = Some(at);
            return Ok(EntryRecord::Claimed(open.clone()));
        }
        let mut session = empty_session(plate, generate_booking_id(at));
        session.entry_time = Some(at);
        Ok(EntryRecord::Created(inner.push(session)))
    }

    async fn record_exit(
        &self,
        session_id: i64,
        at: DateTime<Utc>,
        bill_amount: i64,
    ) -> Result<Option<ParkingSession>, StoreError> {
        let mut inner = self.lock();
        let closed = inner
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.is_open())
            .map(|s| {
                s.exit_time = Some(at);
                s.bill_amount = Some(bill_amount);
                s.clone()
            });
        Ok(closed)
    }

    async fn assign_slot(
        &self,
        plate: &PlateNumber,
        slot: i32,
    ) -> Result<ParkingSession, StoreError> {
        let mut inner = self.lock();
        let taken = inner
            .sessions
            .iter()
            .any(|s| s.is_open() && s.slot == Some(slot) && s.plate != plate.as_str());
        let open = inner
            .open_mut(plate.as_str())
            .ok_or_else(|| StoreError::NotFound(plate.to_string()))?;
        if taken {
            return Err(StoreError::SlotTaken(slot));
        }
        open.slot = Some(slot);
        Ok(open.clone())
    }

    async fn list_open(&self) -> Result<Vec<ParkingSession>, StoreError> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .filter(|s| s.is_open())
            .cloned()
            .collect())
    }

    async fn count_occupied_slots(&self) -> Result<i64, StoreError> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .filter(|s| s.is_open() && s.slot.is_some())
            .count() as i64)
    }

    async fn daily_stats(&self, since: DateTime<Utc>) -> Result<DailyStats, StoreError> {
        let inner = self.lock();
        let mut stats = DailyStats::default();
        for s in &inner.sessions {
            if s.entry_time.is_some_and(|t| t >= since) {
                stats.today_entries += 1;
            }
            if s.is_open() && s.has_entered() {
                stats.currently_parked += 1;
            }
            if s.exit_time.is_some_and(|t| t >= since) {
                stats.exited_today += 1;
                stats.revenue_today += s.bill_amount.unwrap_or(0);
            }
        }
        Ok(stats)
    }
}
