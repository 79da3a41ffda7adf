pub mod booking;
pub mod dashboard;
pub mod health;
pub mod plate;
