use thiserror::Error;

/// Name of the partial unique index guarding one open session per plate.
pub const OPEN_PLATE_CONSTRAINT: &str = "parking_sessions_open_plate_idx";
/// Name of the partial unique index guarding one open session per slot.
pub const OPEN_SLOT_CONSTRAINT: &str = "parking_sessions_open_slot_idx";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("vehicle {0} already has an active booking or session")]
    OpenSessionExists(String),

    #[error("slot {0} is already taken")]
    SlotTaken(i32),

    #[error("no open session for plate {0}")]
    NotFound(String),

    #[error("session for plate {0} kept changing while recording entry")]
    Contended(String),
}

/// Returns the violated constraint name when `err` is a unique violation (SQLSTATE 23505).
pub fn unique_violation(err: &sqlx::Error) -> Option<String> {
    if let sqlx::Error::Database(db_err) = err {
        if db_err.code().as_deref() == Some("23505") {
            return Some(db_err.constraint().unwrap_or_default().to_string());
        }
    }
    None
}
