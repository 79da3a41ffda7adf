use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use reqwest::Client;

use crate::config::Config;
use crate::models::PlateFormat;
use crate::repository::SessionStore;
use crate::service::{
    BillingPolicy, CameraClient, Devices, DisplayClient, EntryExitWorkflow, GateDispatcher,
    PlateRecognizer, RetryPolicy, RetryTracker, WorkflowSettings,
};

/// Shared handler state. Cloned per request, so everything heavy sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<EntryExitWorkflow>,
    pub sessions: Arc<dyn SessionStore>,
    pub probe_client: Client,
    pub total_slots: i32,
    pub strict_gate_actuation: bool,
    pub debug_image_dir: Option<PathBuf>,
}

impl AppState {
    pub fn build(
        config: &Config,
        sessions: Arc<dyn SessionStore>,
        recognizer: Arc<dyn PlateRecognizer>,
    ) -> anyhow::Result<Self> {
        let timeout = config.peripheral_timeout;
        let devices = Devices {
            gate: GateDispatcher::new(
                config.gate_controller_url.as_str(),
                timeout,
                RetryPolicy::fixed(config.gate_max_attempts, config.gate_backoff),
            )
            .context("Failed to build gate controller client")?,
            camera: CameraClient::new(config.camera_url.as_str(), timeout)
                .context("Failed to build camera client")?,
            display: DisplayClient::new(config.display_controller_url.as_str(), timeout)
                .context("Failed to build display controller client")?,
        };

        let settings = WorkflowSettings {
            max_recognition_retries: config.max_recognition_retries,
            flash_threshold: config.flash_threshold,
            plate_format: PlateFormat::from_strict_flag(config.plate_format_strict),
            billing: BillingPolicy::new(config.minimum_charge, config.per_minute_rate),
        };

        let workflow = EntryExitWorkflow::new(
            recognizer,
            sessions.clone(),
            devices,
            RetryTracker::new(config.retry_counter_ttl),
            settings,
        );

        Ok(Self {
            workflow: Arc::new(workflow),
            sessions,
            probe_client: Client::builder()
                .build()
                .context("Failed to build probe client")?,
            total_slots: config.total_slots,
            strict_gate_actuation: config.strict_gate_actuation,
            debug_image_dir: config.debug_image_dir.as_ref().map(PathBuf::from),
        })
    }

    pub fn plate_format(&self) -> PlateFormat {
        self.workflow.settings().plate_format
    }
}
