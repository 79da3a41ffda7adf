pub mod outcome;
pub mod plate;
pub mod session;

pub use outcome::{Direction, EntryDenial, ExitDenial, PlateResponse, RecognitionOutcome};
pub use plate::{PlateError, PlateFormat, PlateNumber};
pub use session::{generate_booking_id, DailyStats, EntryRecord, NewBooking, ParkingSession};
