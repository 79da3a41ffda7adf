use axum::{extract::State, response::Json, routing::get, Router};
use chrono::{DateTime, Duration, Local, Utc};
use serde::Serialize;
use serde_json::json;

use crate::error::AppError;
use crate::models::ParkingSession;
use crate::service::peripherals::probe_device;
use crate::service::DeviceStatus;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard", get(dashboard))
        .route("/api/admin_stats", get(admin_stats))
        .route("/api/system_status", get(system_status))
}

#[derive(Debug, Serialize)]
pub struct SlotView {
    pub number: i32,
    pub status: &'static str,
    pub plate: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ParkedCar {
    pub plate: String,
    pub booking_id: String,
    pub slot: Option<i32>,
    pub entry_time: Option<String>,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub total_slots: i32,
    pub available: i64,
    pub occupied: i64,
    pub slots: Vec<SlotView>,
    pub parked_cars: Vec<ParkedCar>,
}

fn build_dashboard(total_slots: i32, open: &[ParkingSession], now: DateTime<Utc>) -> Dashboard {
    let slots: Vec<SlotView> = (1..=total_slots)
        .map(|number| {
            let car = open.iter().find(|s| s.slot == Some(number));
            SlotView {
                number,
                status: if car.is_some() { "occupied" } else { "available" },
                plate: car.map(|s| s.plate.clone()),
            }
        })
        .collect();
    let occupied = slots.iter().filter(|s| s.plate.is_some()).count() as i64;

    let parked_cars = open
        .iter()
        .map(|s| ParkedCar {
            plate: s.plate.clone(),
            booking_id: s.booking_id.clone(),
            slot: s.slot,
            entry_time: s
                .entry_time
                .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()),
            duration_minutes: s.entry_time.map(|t| (now - t).num_minutes().max(0)),
        })
        .collect();

    Dashboard {
        total_slots,
        available: (i64::from(total_slots) - occupied).max(0),
        occupied,
        slots,
        parked_cars,
    }
}

async fn dashboard(State(state): State<AppState>) -> Result<Json<Dashboard>, AppError> {
    let open = state.sessions.list_open().await?;
    Ok(Json(build_dashboard(state.total_slots, &open, Utc::now())))
}

/// Midnight of the local calendar day containing `now`, in UTC.
fn start_of_local_day(now: DateTime<Local>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc) - Duration::hours(24))
}

async fn admin_stats(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let since = start_of_local_day(Local::now());
    let stats = state.sessions.daily_stats(since).await?;
    Ok(Json(json!({
        "success": true,
        "stats": stats
    })))
}

#[derive(Debug, Serialize)]
struct DeviceReport {
    url: String,
    status: DeviceStatus,
}

async fn system_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let devices = state.workflow.devices();
    let client = &state.probe_client;
    let (camera, gate, display) = tokio::join!(
        probe_device(client, devices.camera.base_url()),
        probe_device(client, devices.gate.base_url()),
        probe_device(client, devices.display.base_url()),
    );

    Json(json!({
        "camera": DeviceReport { url: devices.camera.base_url().to_string(), status: camera },
        "gate_controller": DeviceReport { url: devices.gate.base_url().to_string(), status: gate },
        "display_controller": DeviceReport { url: devices.display.base_url().to_string(), status: display },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn open_session(plate: &str, slot: Option<i32>, entered: Option<DateTime<Utc>>) -> ParkingSession {
        ParkingSession {
            id: 1,
            plate: plate.to_string(),
            booking_id: "BK20240101090000".to_string(),
            name: None,
            phone: None,
            booking_time: None,
            entry_time: entered,
            exit_time: None,
            slot,
            bill_amount: None,
        }
    }

    #[test]
    fn dashboard_marks_assigned_slots_occupied() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let open = vec![
            open_session("MH12AB1234", Some(2), Some(now - Duration::minutes(42))),
            open_session("KA05MN4321", None, None),
        ];

        let view = build_dashboard(4, &open, now);
        assert_eq!(view.occupied, 1);
        assert_eq!(view.available, 3);
        assert_eq!(view.slots[1].status, "occupied");
        assert_eq!(view.slots[1].plate.as_deref(), Some("MH12AB1234"));
        assert_eq!(view.slots[0].status, "available");
        assert_eq!(view.parked_cars.len(), 2);
        assert_eq!(view.parked_cars[0].duration_minutes, Some(42));
        assert_eq!(view.parked_cars[1].duration_minutes, None);
    }

    #[test]
    fn slots_outside_capacity_are_not_counted() {
        let now = Utc::now();
        let open = vec![open_session("MH12AB1234", Some(9), Some(now))];
        let view = build_dashboard(4, &open, now);
        assert_eq!(view.occupied, 0);
        assert_eq!(view.available, 4);
    }

    #[test]
    fn day_starts_at_local_midnight() {
        let now = Local::now();
        let start = start_of_local_day(now);
        assert!(start <= now.with_timezone(&Utc));
        assert!(now.with_timezone(&Utc) - start <= Duration::hours(25));
        assert_eq!(start.with_timezone(&Local).date_naive(), now.date_naive());
    }
}
