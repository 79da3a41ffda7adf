use std::net::SocketAddr;
use std::path::Path;

use axum::{
    extract::{ConnectInfo, Multipart, State},
    response::Json,
    routing::post,
    Router,
};
use chrono::Utc;

use crate::constants::API_NAME;
use crate::error::AppError;
use crate::models::{Direction, PlateResponse};
use crate::service::{PlateSubmission, RetryKey};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/analyze-plate", post(analyze_plate))
}

struct UploadedImage {
    bytes: Vec<u8>,
    mime_type: String,
}

async fn analyze_plate(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut multipart: Multipart,
) -> Result<Json<PlateResponse>, AppError> {
    let mut image: Option<UploadedImage> = None;
    let mut direction = Direction::Entry;
    let mut device_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                if field.file_name() == Some("") {
                    return Err(AppError::Validation("No image selected".to_string()));
                }
                let mime_type = field.content_type().unwrap_or("image/jpeg").to_string();
                let bytes = field.bytes().await.map_err(malformed)?;
                image = Some(UploadedImage {
                    bytes: bytes.to_vec(),
                    mime_type,
                });
            }
            Some("type") => {
                let text = field.text().await.map_err(malformed)?;
                direction = text.parse().map_err(AppError::Validation)?;
            }
            Some("device_id") => {
                let text = field.text().await.map_err(malformed)?;
                let text = text.trim();
                if !text.is_empty() {
                    device_id = Some(text.to_string());
                }
            }
            _ => {}
        }
    }

    let image = match image {
        Some(image) if !image.bytes.is_empty() => image,
        _ => return Err(AppError::Validation("No image provided".to_string())),
    };

    // Cameras that don't send a device id are told apart by address.
    let device = device_id.unwrap_or_else(|| peer.ip().to_string());
    let retry_key = RetryKey::new(device, direction);
    tracing::info!(
        "{} Received {} image from {} ({} bytes)",
        API_NAME,
        direction,
        retry_key,
        image.bytes.len()
    );

    if let Some(dir) = &state.debug_image_dir {
        save_debug_image(dir, &retry_key, &image.bytes).await;
    }

    // Runs on its own task so a camera hanging up cannot cut the workflow
    // off between a committed store write and the gate command.
    let workflow = state.workflow.clone();
    let submission = PlateSubmission {
        image: image.bytes,
        mime_type: image.mime_type,
        direction,
        retry_key,
    };
    let outcome = tokio::spawn(async move { workflow.process(submission).await })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("plate workflow task failed: {}", e)))??;

    tracing::info!("{} Recognition outcome: {}", API_NAME, outcome.name());
    Ok(Json(outcome.to_response(state.strict_gate_actuation)))
}

fn malformed(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("Malformed multipart body: {}", err))
}

async fn save_debug_image(dir: &Path, key: &RetryKey, bytes: &[u8]) {
    let safe_key: String = key
        .to_string()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let file = dir.join(format!(
        "{}_{}.jpg",
        safe_key,
        Utc::now().format("%Y%m%d_%H%M%S%.3f")
    ));

    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        tracing::warn!("{} Cannot create debug image dir {:?}: {}", API_NAME, dir, e);
        return;
    }
    match tokio::fs::write(&file, bytes).await {
        Ok(()) => tracing::debug!("{} Saved debug image {:?}", API_NAME, file),
        Err(e) => tracing::warn!("{} Failed to save debug image {:?}: {}", API_NAME, file, e),
    }
}
