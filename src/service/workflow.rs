use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use super::billing::BillingPolicy;
use super::gate::{GateAction, GateDispatcher};
use super::peripherals::{CameraClient, DisplayClient};
use super::recognition::{PlateRecognizer, PlateResult, RecognitionError};
use super::retry_tracker::{RetryKey, RetryTracker};
use crate::constants::API_NAME;
use crate::models::{
    Direction, EntryDenial, EntryRecord, ExitDenial, PlateFormat, PlateNumber, RecognitionOutcome,
};
use crate::repository::{SessionStore, StoreError};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Unclear frames tolerated per capture sequence; the last one ends it.
    pub max_recognition_retries: u32,
    /// Retries already spent before the recapture asks for flash.
    pub flash_threshold: u32,
    pub plate_format: PlateFormat,
    pub billing: BillingPolicy,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_recognition_retries: 5,
            flash_threshold: 3,
            plate_format: PlateFormat::Strict,
            billing: BillingPolicy::default(),
        }
    }
}

/// Embedded peripherals the workflow talks to.
#[derive(Debug, Clone)]
pub struct Devices {
    pub gate: GateDispatcher,
    pub camera: CameraClient,
    pub display: DisplayClient,
}

#[derive(Debug, Clone)]
pub struct PlateSubmission {
    pub image: Vec<u8>,
    pub mime_type: String,
    pub direction: Direction,
    pub retry_key: RetryKey,
}

/// Turns one camera frame into an entry/exit decision.
pub struct EntryExitWorkflow {
    recognizer: Arc<dyn PlateRecognizer>,
    sessions: Arc<dyn SessionStore>,
    devices: Devices,
    retries: RetryTracker,
    settings: WorkflowSettings,
}

impl EntryExitWorkflow {
    pub fn new(
        recognizer: Arc<dyn PlateRecognizer>,
        sessions: Arc<dyn SessionStore>,
        devices: Devices,
        retries: RetryTracker,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            recognizer,
            sessions,
            devices,
            retries,
            settings,
        }
    }

    pub fn retry_tracker(&self) -> &RetryTracker {
        &self.retries
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn devices(&self) -> &Devices {
        &self.devices
    }

    pub async fn process(
        &self,
        submission: PlateSubmission,
    ) -> Result<RecognitionOutcome, WorkflowError> {
        let key = &submission.retry_key;
        tracing::info!(
            "{} Processing {} frame from {} ({} bytes, {} previous retries)",
            API_NAME,
            submission.direction,
            key,
            submission.image.len(),
            self.retries.count(key)
        );

        let verdict = self
            .recognizer
            .recognize(&submission.image, &submission.mime_type)
            .await?;

        let raw = match verdict {
            PlateResult::Unclear => return Ok(self.handle_unclear(key).await),
            PlateResult::NoPlate => {
                self.retries.reset(key);
                tracing::info!("{} Gate remains closed: no plate visible ({})", API_NAME, key);
                return Ok(RecognitionOutcome::NoPlate);
            }
            PlateResult::Plate(raw) => raw,
        };

        self.retries.reset(key);
        let plate = match PlateNumber::parse(&raw, self.settings.plate_format) {
            Ok(plate) => plate,
            Err(e) => {
                tracing::warn!("{} Gate remains closed: {} ({})", API_NAME, e, key);
                return Ok(RecognitionOutcome::InvalidPlate { raw });
            }
        };
        tracing::info!("{} Plate detected: {}", API_NAME, plate);

        let outcome = match submission.direction {
            Direction::Entry => self.handle_entry(plate).await?,
            Direction::Exit => self.handle_exit(plate).await?,
        };
        Ok(outcome)
    }

    async fn handle_unclear(&self, key: &RetryKey) -> RecognitionOutcome {
        let attempt = self.retries.register_unclear(key);
        if attempt < self.settings.max_recognition_retries {
            let flash = attempt - 1 >= self.settings.flash_threshold;
            self.devices.camera.request_capture(flash).await;
            tracing::info!(
                "{} Gate remains closed: image unclear, retrying (attempt {}, flash={})",
                API_NAME,
                attempt,
                flash
            );
            return RecognitionOutcome::Retry { attempt, flash };
        }

        self.retries.reset(key);
        tracing::warn!(
            "{} Gate remains closed: max retries ({}) reached for {}",
            API_NAME,
            self.settings.max_recognition_retries,
            key
        );
        RecognitionOutcome::MaxRetriesReached
    }

    async fn handle_entry(&self, plate: PlateNumber) -> Result<RecognitionOutcome, StoreError> {
        let session = match self.sessions.record_entry(&plate, Utc::now()).await? {
            EntryRecord::AlreadyParked(_) => {
                tracing::warn!("{} Gate remains closed: {} already parked", API_NAME, plate);
                return Ok(RecognitionOutcome::EntryDenied {
                    plate: plate.to_string(),
                    reason: EntryDenial::AlreadyParked,
                });
            }
            EntryRecord::Claimed(session) => {
                tracing::info!(
                    "{} Entry for {} claims booking {}",
                    API_NAME,
                    plate,
                    session.booking_id
                );
                session
            }
            EntryRecord::Created(session) => {
                tracing::info!(
                    "{} Walk-in entry for {}, booking {}",
                    API_NAME,
                    plate,
                    session.booking_id
                );
                session
            }
        };

        let gate_actuated = self.devices.gate.send(GateAction::Open).await;
        if gate_actuated {
            tracing::info!("{} Gate opening for {}", API_NAME, plate);
        } else {
            tracing::warn!(
                "{} Gate command failed: {} admitted but the gate may not open",
                API_NAME,
                plate
            );
        }

        if let Err(e) = self.devices.display.show_plate(plate.as_str()).await {
            tracing::warn!("{} Failed to notify display controller: {}", API_NAME, e);
        }

        Ok(RecognitionOutcome::EntryAllowed {
            plate: plate.to_string(),
            booking_id: session.booking_id,
            gate_actuated,
        })
    }

    async fn handle_exit(&self, plate: PlateNumber) -> Result<RecognitionOutcome, StoreError> {
        let denied = |reason| RecognitionOutcome::ExitDenied {
            plate: plate.to_string(),
            reason,
        };

        let Some(session) = self.sessions.find_open(&plate).await? else {
            tracing::warn!("{} Gate remains closed: {} not found", API_NAME, plate);
            return Ok(denied(ExitDenial::NotFound));
        };
        let Some(entry_time) = session.entry_time else {
            tracing::warn!(
                "{} Gate remains closed: {} has booking {} but never entered",
                API_NAME,
                plate,
                session.booking_id
            );
            return Ok(denied(ExitDenial::NotEntered));
        };

        let now = Utc::now();
        let bill_amount = self.settings.billing.fee(entry_time, now);
        if self
            .sessions
            .record_exit(session.id, now, bill_amount)
            .await?
            .is_none()
        {
            tracing::warn!("{} Gate remains closed: {} exited concurrently", API_NAME, plate);
            return Ok(denied(ExitDenial::NotFound));
        }

        if let Err(e) = self.devices.display.show_bill(plate.as_str(), bill_amount).await {
            tracing::warn!("{} Display bill failed: {}", API_NAME, e);
        }

        let gate_actuated = self.devices.gate.send(GateAction::Open).await;
        if gate_actuated {
            tracing::info!(
                "{} Gate opening: exit approved for {}, bill {}",
                API_NAME,
                plate,
                bill_amount
            );
        } else {
            tracing::warn!(
                "{} Gate command failed: exit approved for {} but the gate may not open",
                API_NAME,
                plate
            );
        }

        Ok(RecognitionOutcome::ExitApproved {
            plate: plate.to_string(),
            bill_amount,
            gate_actuated,
        })
    }
}
