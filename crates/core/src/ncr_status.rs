//! NCR workflow status constants and the transition table.
//!
//! These must match the `CHECK` constraint on `ncrs.status` in the
//! migrations. Status only ever moves along the edges listed in
//! [`valid_transitions`]; no edge may be skipped and nothing leaves
//! `closed`.

use crate::error::CoreError;

/// Initial status for a newly raised NCR. Awaiting a root-cause response.
pub const STATUS_OPEN: &str = "open";
/// A response has been submitted and is awaiting QM review.
pub const STATUS_INVESTIGATING: &str = "investigating";
/// The proposed corrective action was accepted; rectification in progress.
pub const STATUS_RECTIFICATION: &str = "rectification";
/// Rectification complete; awaiting verification and closure.
pub const STATUS_VERIFICATION: &str = "verification";
/// Terminal. Verified and closed; no further transitions.
pub const STATUS_CLOSED: &str = "closed";

/// All valid NCR statuses.
pub const VALID_STATUSES: &[&str] = &[
    STATUS_OPEN,
    STATUS_INVESTIGATING,
    STATUS_RECTIFICATION,
    STATUS_VERIFICATION,
    STATUS_CLOSED,
];

/// Returns the set of statuses that `from_status` may transition to.
///
/// Transition rules:
/// - `open`          -> `investigating` (respond)
/// - `investigating` -> `rectification` (review accepted), `open` (revision requested)
/// - `rectification` -> `verification` (rectify)
/// - `verification`  -> `closed` (close)
/// - `closed`        -> (terminal)
pub fn valid_transitions(from_status: &str) -> &'static [&'static str] {
    match from_status {
        STATUS_OPEN => &[STATUS_INVESTIGATING],
        STATUS_INVESTIGATING => &[STATUS_RECTIFICATION, STATUS_OPEN],
        STATUS_RECTIFICATION => &[STATUS_VERIFICATION],
        STATUS_VERIFICATION => &[STATUS_CLOSED],
        STATUS_CLOSED => &[],
        _ => &[],
    }
}

/// Returns `true` if the status is terminal.
pub fn is_terminal(status: &str) -> bool {
    status == STATUS_CLOSED
}

/// Validate that a status string is one of the known statuses.
pub fn validate_status(status: &str) -> Result<(), CoreError> {
    if VALID_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid NCR status '{status}'. Must be one of: {}",
            VALID_STATUSES.join(", ")
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
