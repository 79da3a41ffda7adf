//! HTTP clients for the camera and the display controller, plus the
//! `/status` probe shared by all embedded devices.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::json;

use crate::constants::API_NAME;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

fn trim_base(url: impl Into<String>) -> String {
    url.into().trim_end_matches('/').to_string()
}

#[derive(Debug, Clone)]
pub struct CameraClient {
    client: Client,
    base_url: String,
}

impl CameraClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: trim_base(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Asks the camera for a new frame. Failures are logged and swallowed.
    pub async fn request_capture(&self, flash: bool) {
        let url = format!("{}/capture", self.base_url);
        let flash = if flash { "1" } else { "0" };
        match self.client.get(&url).query(&[("flash", flash)]).send().await {
            Ok(resp) => tracing::debug!(
                "{} Capture requested (flash={}): HTTP {}",
                API_NAME,
                flash,
                resp.status().as_u16()
            ),
            Err(e) => tracing::warn!("{} Capture request failed: {}", API_NAME, e),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("display request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("display answered HTTP {0}")]
    Status(u16),
}

#[derive(Debug, Clone)]
pub struct DisplayClient {
    client: Client,
    base_url: String,
}

impl DisplayClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: trim_base(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn show_plate(&self, plate: &str) -> Result<(), DisplayError> {
        self.post("/set_plate", json!({ "plate": plate })).await
    }

    pub async fn show_bill(&self, plate: &str, amount: i64) -> Result<(), DisplayError> {
        self.post("/display_bill", json!({ "plate": plate, "amount": amount }))
            .await
    }

    async fn post(&self, endpoint: &str, body: serde_json::Value) -> Result<(), DisplayError> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(DisplayError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Error,
    Offline,
}

/// `GET {base_url}/status`: 200 is online, any other answer is an error,
/// no answer at all is offline.
pub async fn probe_device(client: &Client, base_url: &str) -> DeviceStatus {
    let url = format!("{}/status", base_url.trim_end_matches('/'));
    match client.get(&url).timeout(PROBE_TIMEOUT).send().await {
        Ok(resp) if resp.status() == StatusCode::OK => DeviceStatus::Online,
        Ok(resp) => {
            tracing::warn!(
                "{} Device {} answered HTTP {}",
                API_NAME,
                base_url,
                resp.status().as_u16()
            );
            DeviceStatus::Error
        }
        Err(e) => {
            tracing::warn!("{} Device {} unreachable: {}", API_NAME, base_url, e);
            DeviceStatus::Offline
        }
    }
}
