use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Entry,
    Exit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Entry => "entry",
            Direction::Exit => "exit",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entry" => Ok(Direction::Entry),
            "exit" => Ok(Direction::Exit),
            other => Err(format!("type must be 'entry' or 'exit', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDenial {
    AlreadyParked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDenial {
    /// No open session, or it was closed by a concurrent exit.
    NotFound,
    /// The open session is a booking whose vehicle never came in.
    NotEntered,
}

/// Decision reached for one plate submission.
///
/// `gate_actuated` records whether the gate controller acknowledged the
/// open command; the business decision is independent of it.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutcome {
    Retry { attempt: u32, flash: bool },
    MaxRetriesReached,
    NoPlate,
    InvalidPlate { raw: String },
    EntryAllowed { plate: String, booking_id: String, gate_actuated: bool },
    EntryDenied { plate: String, reason: EntryDenial },
    ExitApproved { plate: String, bill_amount: i64, gate_actuated: bool },
    ExitDenied { plate: String, reason: ExitDenial },
}

impl RecognitionOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            RecognitionOutcome::Retry { .. } => "retry",
            RecognitionOutcome::MaxRetriesReached => "max_retries",
            RecognitionOutcome::NoPlate => "no_plate",
            RecognitionOutcome::InvalidPlate { .. } => "invalid_plate",
            RecognitionOutcome::EntryAllowed { .. } => "entry_allowed",
            RecognitionOutcome::EntryDenied { .. } => "entry_denied",
            RecognitionOutcome::ExitApproved { .. } => "exit_approved",
            RecognitionOutcome::ExitDenied { .. } => "exit_denied",
        }
    }

    /// Renders the outcome for the camera/frontend.
    ///
    /// With `strict_actuation` a failed gate command turns `success` off even
    /// though the session was already updated.
    pub fn to_response(&self, strict_actuation: bool) -> PlateResponse {
        let mut resp = PlateResponse::failure(self.name());
        match self {
            RecognitionOutcome::Retry { attempt, flash } => {
                resp.error = Some("Image unclear, retrying...".to_string());
                resp.retry = Some(*attempt);
                resp.flash = Some(*flash);
                resp.gate_status = GATE_STATUS_RETRYING.to_string();
            }
            RecognitionOutcome::MaxRetriesReached => {
                resp.error = Some("Max retries reached, image still unclear".to_string());
                resp.gate_status = GATE_STATUS_NO_CLEAR_PLATE.to_string();
            }
            RecognitionOutcome::NoPlate => {
                resp.error = Some("No vehicle or plate visible".to_string());
                resp.gate_status = GATE_STATUS_NO_PLATE.to_string();
            }
            RecognitionOutcome::InvalidPlate { raw } => {
                resp.error = Some("Recognized text is not a valid plate".to_string());
                resp.plate_text = Some(raw.clone());
                resp.gate_status = GATE_STATUS_INVALID_PLATE.to_string();
            }
            RecognitionOutcome::EntryAllowed { plate, booking_id, gate_actuated } => {
                resp.success = *gate_actuated || !strict_actuation;
                resp.action = Some("allow".to_string());
                resp.plate_text = Some(plate.clone());
                resp.booking_id = Some(booking_id.clone());
                resp.gate_actuated = Some(*gate_actuated);
                resp.gate_status = if *gate_actuated || !strict_actuation {
                    GATE_STATUS_OPENING_ENTRY
                } else {
                    GATE_STATUS_FAILED_ENTRY
                }
                .to_string();
            }
            RecognitionOutcome::EntryDenied { plate, reason } => {
                resp.action = Some("deny".to_string());
                resp.plate_text = Some(plate.clone());
                match reason {
                    EntryDenial::AlreadyParked => {
                        resp.error = Some("Car already parked".to_string());
                        resp.gate_status = GATE_STATUS_ALREADY_PARKED.to_string();
                    }
                }
            }
            RecognitionOutcome::ExitApproved { plate, bill_amount, gate_actuated } => {
                resp.success = *gate_actuated || !strict_actuation;
                resp.action = Some("exit".to_string());
                resp.plate_text = Some(plate.clone());
                resp.bill_amount = Some(*bill_amount);
                resp.gate_actuated = Some(*gate_actuated);
                resp.gate_status = if *gate_actuated || !strict_actuation {
                    GATE_STATUS_OPENING_EXIT
                } else {
                    GATE_STATUS_FAILED_EXIT
                }
                .to_string();
            }
            RecognitionOutcome::ExitDenied { plate, reason } => {
                resp.action = Some("deny".to_string());
                resp.plate_text = Some(plate.clone());
                let (error, status) = match reason {
                    ExitDenial::NotFound => ("Car not found or already exited", GATE_STATUS_NOT_FOUND),
                    ExitDenial::NotEntered => {
                        ("Car has a booking but never entered", GATE_STATUS_NOT_ENTERED)
                    }
                };
                resp.error = Some(error.to_string());
                resp.gate_status = status.to_string();
            }
        }
        resp
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateResponse {
    pub success: bool,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plate_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bill_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_actuated: Option<bool>,
    pub gate_status: String,
}

impl PlateResponse {
    fn failure(outcome: &str) -> Self {
        Self {
            success: false,
            outcome: outcome.to_string(),
            action: None,
            error: None,
            plate_text: None,
            booking_id: None,
            bill_amount: None,
            retry: None,
            flash: None,
            gate_actuated: None,
            gate_status: String::new(),
        }
    }
}
