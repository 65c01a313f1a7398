//! NCR row models and DTOs.

use serde::{Deserialize, Serialize};
use siteqms_core::ncr::NcrRecord;
use siteqms_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `ncrs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Ncr {
    pub id: DbId,
    pub project_id: DbId,
    pub ncr_number: i32,
    pub title: String,
    pub description: Option<String>,
    pub severity: String,
    pub category: Option<String>,
    pub status: String,
    pub revision_requested: bool,
    pub qm_approval_granted: bool,
    pub root_cause_category: Option<String>,
    pub root_cause_description: Option<String>,
    pub proposed_corrective_action: Option<String>,
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

impl From<Ncr> for NcrRecord {
    fn from(row: Ncr) -> Self {
        NcrRecord {
            id: row.id,
            project_id: row.project_id,
            ncr_number: row.ncr_number,
            title: row.title,
            description: row.description,
            severity: row.severity,
            category: row.category,
            status: row.status,
            revision_requested: row.revision_requested,
            qm_approval_granted: row.qm_approval_granted,
            root_cause_category: row.root_cause_category,
            root_cause_description: row.root_cause_description,
            proposed_corrective_action: row.proposed_corrective_action,
            review_comments: row.review_comments,
            rectification_notes: row.rectification_notes,
            verification_notes: row.verification_notes,
            lessons_learned: row.lessons_learned,
            raised_by_id: row.raised_by_id,
            responsible_user_id: row.responsible_user_id,
            raised_at: row.raised_at,
            due_date: row.due_date,
            closed_at: row.closed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// DTO for raising a new NCR.
///
/// `ncr_number` is not part of the DTO; it is assigned atomically from the
/// per-project counter at insert time.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNcr {
    pub project_id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub severity: String,
    pub category: Option<String>,
    pub raised_by_id: DbId,
    pub responsible_user_id: Option<DbId>,
    pub due_date: Option<Timestamp>,
}

/// A row from the `ncr_evidence` table.
///
/// Evidence attachments are audit material only; they never affect
/// workflow transitions.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NcrEvidence {
    pub id: DbId,
    pub ncr_id: DbId,
    pub file_path: String,
    pub caption: Option<String>,
    pub uploaded_by_id: DbId,
    pub created_at: Timestamp,
}

/// DTO for attaching evidence to an NCR.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNcrEvidence {
    pub file_path: String,
    pub caption: Option<String>,
}

/// A row from the `ncr_lot_links` table (NCR <-> lot, many-to-many).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NcrLotLink {
    pub ncr_id: DbId,
    pub lot_id: DbId,
    pub created_at: Timestamp,
}
