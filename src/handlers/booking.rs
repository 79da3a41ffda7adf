use axum::{extract::State, response::Json, routing::post, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::constants::API_NAME;
use crate::error::AppError;
use crate::models::{NewBooking, PlateNumber};
use crate::repository::StoreError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/book", post(book))
        .route("/api/update_slot", post(update_slot))
}

#[derive(Debug, Deserialize, Validate)]
pub struct BookingRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "plate is required"))]
    pub plate: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SlotUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "plate is required"))]
    pub plate: String,
    pub slot: i32,
}

fn parse_plate(state: &AppState, raw: &str) -> Result<PlateNumber, AppError> {
    PlateNumber::parse(raw, state.plate_format()).map_err(|e| AppError::Validation(e.to_string()))
}

async fn book(
    State(state): State<AppState>,
    Json(req): Json<BookingRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    req.validate()
        .map_err(|e| AppError::Validation(format!("All fields required: {}", e)))?;
    let plate = parse_plate(&state, &req.plate)?;

    let occupied = state.sessions.count_occupied_slots().await?;
    if occupied >= i64::from(state.total_slots) {
        tracing::info!("{} Booking for {} rejected: lot is full", API_NAME, plate);
        return Ok(Json(json!({
            "success": false,
            "message": "No slots available"
        })));
    }

    let booking = NewBooking::new(
        plate,
        req.name.trim().to_string(),
        req.phone.trim().to_string(),
        Utc::now(),
    );
    match state.sessions.create_booking(&booking).await {
        Ok(session) => {
            tracing::info!(
                "{} Booking {} created for {}",
                API_NAME,
                session.booking_id,
                session.plate
            );
            Ok(Json(json!({
                "success": true,
                "message": "Booking confirmed",
                "booking_id": session.booking_id
            })))
        }
        Err(StoreError::OpenSessionExists(plate)) => {
            tracing::info!("{} Booking for {} rejected: already active", API_NAME, plate);
            Ok(Json(json!({
                "success": false,
                "message": "Vehicle already has active booking"
            })))
        }
        Err(e) => Err(e.into()),
    }
}

async fn update_slot(
    State(state): State<AppState>,
    Json(req): Json<SlotUpdate>,
) -> Result<Json<serde_json::Value>, AppError> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if !(1..=state.total_slots).contains(&req.slot) {
        return Err(AppError::Validation(format!(
            "slot must be between 1 and {}",
            state.total_slots
        )));
    }
    let plate = parse_plate(&state, &req.plate)?;

    let session = state.sessions.assign_slot(&plate, req.slot).await?;
    tracing::info!("{} Slot {} assigned to {}", API_NAME, req.slot, session.plate);

    Ok(Json(json!({
        "success": true,
        "plate": session.plate,
        "slot": req.slot
    })))
}
