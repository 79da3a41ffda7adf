use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "message": "Parking gate backend is healthy"
    }))
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let devices = state.workflow.devices();
    Json(json!({
        "status": "ready",
        "camera_url": devices.camera.base_url(),
        "gate_controller_url": devices.gate.base_url(),
        "display_controller_url": devices.display.base_url()
    }))
}
