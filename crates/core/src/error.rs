//! Domain error taxonomy.
//!
//! Every rejection the workflow engine surfaces is one of these variants,
//! so the HTTP layer can map each kind to a distinct status code without
//! parsing message strings. Raw storage or notification errors must never
//! leak past the engine boundary; they are wrapped in [`CoreError::Internal`].

use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The referenced entity does not exist.
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// The NCR is not in the state the operation requires.
    ///
    /// The message names the required state verbatim ("NCR is not in open
    /// status"); callers rely on that phrasing.
    #[error("NCR is not in {required} status")]
    WrongState {
        /// The operation that was attempted (e.g. `"respond"`).
        operation: &'static str,
        /// The status the operation requires (e.g. `"open"`).
        required: &'static str,
    },

    /// Malformed or incomplete request payload.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Concurrent modification lost the compare-and-swap race.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or invalid credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The actor's role does not permit the operation, or a required
    /// approval gate has not been passed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unexpected internal failure (storage backend, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
