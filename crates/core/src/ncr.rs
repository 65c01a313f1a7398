//! The canonical NCR record as seen by the workflow engine.
//!
//! This is the authoritative in-memory shape of a non-conformance report.
//! The persistence layer maps its row model into this struct before the
//! guard ever sees it; nothing outside the engine's single write path may
//! mutate `status`, `revision_requested`, or `qm_approval_granted`.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// A non-conformance report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NcrRecord {
    pub id: DbId,
    pub project_id: DbId,
    /// Human-readable sequential number, unique and monotonic per project.
    /// Assigned at creation and never reused.
    pub ncr_number: i32,
    pub title: String,
    pub description: Option<String>,
    /// `"minor"` or `"major"`. Immutable after creation.
    pub severity: String,
    /// Free-form descriptive tag (e.g. `"concrete"`, `"welding"`).
    pub category: Option<String>,
    /// Current workflow status. See [`crate::ncr_status`].
    pub status: String,
    /// True only between a `request_revision` decision and the next
    /// successful `respond`.
    pub revision_requested: bool,
    /// Only meaningful for major severity; transitions false -> true once
    /// and is never reset.
    pub qm_approval_granted: bool,
    pub root_cause_category: Option<String>,
    pub root_cause_description: Option<String>,
    pub proposed_corrective_action: Option<String>,
    /// QM comments recorded with the most recent revision request (audit).
    pub review_comments: Option<String>,
    pub rectification_notes: Option<String>,
    pub verification_notes: Option<String>,
    pub lessons_learned: Option<String>,
    pub raised_by_id: DbId,
    pub responsible_user_id: Option<DbId>,
    pub raised_at: Timestamp,
    pub due_date: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
