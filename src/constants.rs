pub const API_NAME: &str = "[parking-gate-backend]";

/// Prefix of generated booking ids, followed by a `%Y%m%d%H%M%S` timestamp.
pub const BOOKING_ID_PREFIX: &str = "BK";

pub const GATE_STATUS_OPENING_ENTRY: &str = "Gate Opening - Plate Detected";
pub const GATE_STATUS_OPENING_EXIT: &str = "Gate Opening - Exit Approved";
pub const GATE_STATUS_FAILED_ENTRY: &str = "Gate Command Failed - Plate Detected, Gate May Not Open";
pub const GATE_STATUS_FAILED_EXIT: &str = "Gate Command Failed - Exit Approved, Gate May Not Open";
pub const GATE_STATUS_RETRYING: &str = "Gate Remains Closed - Retrying Image Capture";
pub const GATE_STATUS_NO_CLEAR_PLATE: &str = "Gate Remains Closed - No Clear Plate Detected";
pub const GATE_STATUS_NO_PLATE: &str = "Gate Remains Closed - No Vehicle Detected";
pub const GATE_STATUS_INVALID_PLATE: &str = "Gate Remains Closed - Plate Not Recognised";
pub const GATE_STATUS_ALREADY_PARKED: &str = "Gate Remains Closed - Car Already Parked";
pub const GATE_STATUS_NOT_FOUND: &str = "Gate Remains Closed - Car Not Found";
pub const GATE_STATUS_NOT_ENTERED: &str = "Gate Remains Closed - Car Never Entered";
