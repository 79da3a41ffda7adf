#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_gate_backend::config::Config;
use parking_gate_backend::repository::{InMemorySessionStore, SessionStore};
use parking_gate_backend::service::{PlateRecognizer, ScriptedRecognizer};
use parking_gate_backend::{build_app, state::AppState};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tokio::net::TcpListener;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PLATE: &str = "MH12AB1234";

pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub recognizer: Arc<ScriptedRecognizer>,
    pub store: Arc<InMemorySessionStore>,
    pub devices: MockServer,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Uploads one frame the way the camera firmware does.
    pub async fn upload(&self, direction: &str, device_id: &str) -> reqwest::Response {
        let form = Form::new()
            .part(
                "image",
                Part::bytes(b"\xff\xd8\xff\xe0frame".to_vec())
                    .file_name("frame.jpg")
                    .mime_str("image/jpeg")
                    .unwrap(),
            )
            .text("type", direction.to_string())
            .text("device_id", device_id.to_string());

        self.client
            .post(self.url("/api/analyze-plate"))
            .multipart(form)
            .send()
            .await
            .expect("upload request failed")
    }

    pub async fn upload_json(&self, direction: &str, device_id: &str) -> serde_json::Value {
        let resp = self.upload(direction, device_id).await;
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }

    pub async fn device_requests(&self, endpoint: &str) -> usize {
        self.devices
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == endpoint)
            .count()
    }
}

/// Peripherals that accept every command.
pub async fn healthy_devices() -> MockServer {
    let devices = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&devices)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&devices)
        .await;
    devices
}

pub fn test_config(devices: &MockServer) -> Config {
    Config {
        camera_url: devices.uri(),
        gate_controller_url: devices.uri(),
        display_controller_url: devices.uri(),
        peripheral_timeout: Duration::from_secs(2),
        gate_backoff: Duration::ZERO,
        ..Config::default()
    }
}

pub async fn spawn_app() -> TestApp {
    let devices = healthy_devices().await;
    let config = test_config(&devices);
    spawn_app_with(config, devices).await
}

pub async fn spawn_app_with(config: Config, devices: MockServer) -> TestApp {
    let recognizer = Arc::new(ScriptedRecognizer::default());
    let store = Arc::new(InMemorySessionStore::new());
    let addr = serve(&config, store.clone(), recognizer.clone()).await;

    TestApp {
        addr,
        client: Client::new(),
        recognizer,
        store,
        devices,
    }
}

pub async fn serve(
    config: &Config,
    sessions: Arc<dyn SessionStore>,
    recognizer: Arc<dyn PlateRecognizer>,
) -> SocketAddr {
    let state = AppState::build(config, sessions, recognizer).expect("failed to build state");
    let app = build_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    // Wait until the server accepts connections
    for _ in 0..20 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    addr
}
