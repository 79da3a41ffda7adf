pub mod billing;
pub mod gate;
pub mod peripherals;
pub mod recognition;
pub mod retry;
pub mod retry_tracker;
pub mod workflow;

#[cfg(test)]
mod workflow_test;

pub use billing::BillingPolicy;
pub use gate::{GateAction, GateDispatcher};
pub use peripherals::{CameraClient, DeviceStatus, DisplayClient};
pub use recognition::{GeminiPlateRecognizer, PlateRecognizer, PlateResult, ScriptedRecognizer};
pub use retry::RetryPolicy;
pub use retry_tracker::{RetryKey, RetryTracker};
pub use workflow::{Devices, EntryExitWorkflow, PlateSubmission, WorkflowError, WorkflowSettings};
