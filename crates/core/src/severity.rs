//! NCR severity constants and the closure-approval policy.
//!
//! Severity is fixed at creation. Its single workflow effect is whether
//! closure requires a dedicated QM approval step; it must not otherwise
//! alter transition legality.

use crate::error::CoreError;

/// Routine deviation; closes without a QM approval gate.
pub const SEVERITY_MINOR: &str = "minor";
/// Significant deviation; closure requires explicit QM approval.
pub const SEVERITY_MAJOR: &str = "major";

/// All valid severity values.
pub const VALID_SEVERITIES: &[&str] = &[SEVERITY_MINOR, SEVERITY_MAJOR];

/// Returns `true` iff closing an NCR of this severity requires a prior
/// QM approval. Consulted by exactly one guard (close) and nowhere else.
pub fn requires_qm_approval(severity: &str) -> bool {
    severity == SEVERITY_MAJOR
}

/// Validate that a severity string is one of the accepted values.
pub fn validate_severity(severity: &str) -> Result<(), CoreError> {
    if VALID_SEVERITIES.contains(&severity) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid severity '{severity}'. Must be one of: {}",
            VALID_SEVERITIES.join(", ")
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
