use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::plate::PlateNumber;
use crate::constants::BOOKING_ID_PREFIX;

/// One visit of a vehicle, from booking (or first sighting) until exit.
///
/// A session is "open" while `exit_time` is null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ParkingSession {
    pub id: i64,
    pub plate: String,
    pub booking_id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub booking_time: Option<DateTime<Utc>>,
    pub entry_time: Option<DateTime<Utc>>,
    pub exit_time: Option<DateTime<Utc>>,
    pub slot: Option<i32>,
    pub bill_amount: Option<i64>,
}

impl ParkingSession {
    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }

    pub fn has_entered(&self) -> bool {
        self.entry_time.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub plate: PlateNumber,
    pub name: String,
    pub phone: String,
    pub booking_id: String,
    pub booked_at: DateTime<Utc>,
}

impl NewBooking {
    pub fn new(plate: PlateNumber, name: String, phone: String, booked_at: DateTime<Utc>) -> Self {
        Self {
            plate,
            name,
            phone,
            booking_id: generate_booking_id(booked_at),
            booked_at,
        }
    }
}

/// Result of recording a physical entry for a plate.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryRecord {
    /// An open booking without an entry time was claimed.
    Claimed(ParkingSession),
    /// No open session existed; a walk-in session was created.
    Created(ParkingSession),
    /// The plate is already inside. Nothing was written.
    AlreadyParked(ParkingSession),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct DailyStats {
    pub today_entries: i64,
    pub currently_parked: i64,
    pub exited_today: i64,
    pub revenue_today: i64,
}

pub fn generate_booking_id(at: DateTime<Utc>) -> String {
    format!("{}{}", BOOKING_ID_PREFIX, at.format("%Y%m%d%H%M%S"))
}
