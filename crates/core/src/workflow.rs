//! The NCR transition guard.
//!
//! [`evaluate`] decides, for one requested workflow operation, whether the
//! current record, the actor's capabilities, and the payload permit it.
//! On success it returns the [`NcrMutation`] the engine must persist; on
//! rejection it returns a typed [`CoreError`] so callers can distinguish
//! wrong-state, forbidden, and bad-payload failures.
//!
//! Check order is part of the observable contract:
//! 1. request shape (e.g. an unknown review action) -- `Validation`
//! 2. state precondition -- `WrongState` naming the required status
//! 3. payload content (required fields non-empty) -- `Validation`
//! 4. severity closure gate (close only) -- `Forbidden`
//! 5. role authorization -- `Forbidden`

use serde::Deserialize;

use crate::error::CoreError;
use crate::ncr::NcrRecord;
use crate::ncr_status::{
    STATUS_INVESTIGATING, STATUS_OPEN, STATUS_RECTIFICATION, STATUS_VERIFICATION,
};
use crate::roles::NcrActor;
use crate::severity;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Review actions
// ---------------------------------------------------------------------------

/// QM accepts the proposed root cause and corrective action.
pub const REVIEW_ACCEPT: &str = "accept";
/// QM sends the NCR back to `open` for a fresh response.
pub const REVIEW_REQUEST_REVISION: &str = "request_revision";

/// All valid `qm_review` actions.
pub const VALID_REVIEW_ACTIONS: &[&str] = &[REVIEW_ACCEPT, REVIEW_REQUEST_REVISION];

// ---------------------------------------------------------------------------
// Operation payloads
// ---------------------------------------------------------------------------

/// Payload for the `respond` operation.
#[derive(Debug, Clone, Deserialize)]
pub struct RespondPayload {
    pub root_cause_category: String,
    pub root_cause_description: String,
    pub proposed_corrective_action: String,
}

/// Payload for the `qm_review` operation.
#[derive(Debug, Clone, Deserialize)]
pub struct QmReviewPayload {
    /// `"accept"` or `"request_revision"`.
    pub action: String,
    /// Required when requesting a revision.
    pub comments: Option<String>,
}

/// Payload for the `rectify` operation.
#[derive(Debug, Clone, Deserialize)]
pub struct RectifyPayload {
    pub rectification_notes: String,
}

/// Payload for the `close` operation.
#[derive(Debug, Clone, Deserialize)]
pub struct ClosePayload {
    pub verification_notes: Option<String>,
    pub lessons_learned: Option<String>,
}

/// A workflow operation together with its payload.
#[derive(Debug, Clone)]
pub enum OperationPayload {
    Respond(RespondPayload),
    QmReview(QmReviewPayload),
    Rectify(RectifyPayload),
    QmApprove,
    Close(ClosePayload),
}

impl OperationPayload {
    /// The wire name of the operation (used in errors and logs).
    pub fn operation(&self) -> &'static str {
        match self {
            OperationPayload::Respond(_) => "respond",
            OperationPayload::QmReview(_) => "qm_review",
            OperationPayload::Rectify(_) => "rectify",
            OperationPayload::QmApprove => "qm_approve",
            OperationPayload::Close(_) => "close",
        }
    }

    /// The status the record must be in for the operation to proceed.
    pub fn required_status(&self) -> &'static str {
        match self {
            OperationPayload::Respond(_) => STATUS_OPEN,
            OperationPayload::QmReview(_) => STATUS_INVESTIGATING,
            OperationPayload::Rectify(_) => STATUS_RECTIFICATION,
            OperationPayload::QmApprove => STATUS_VERIFICATION,
            OperationPayload::Close(_) => STATUS_VERIFICATION,
        }
    }
}

// ---------------------------------------------------------------------------
// Mutation intents
// ---------------------------------------------------------------------------

/// The state change a successful guard evaluation produces.
///
/// Consumed by the workflow engine, which persists it through a single
/// conditional write keyed on [`expected_status`](NcrMutation::expected_status).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NcrMutation {
    Respond {
        root_cause_category: String,
        root_cause_description: String,
        proposed_corrective_action: String,
    },
    ReviewAccept,
    RequestRevision {
        comments: String,
    },
    Rectify {
        rectification_notes: String,
    },
    /// Side-gate on `verification`; sets the approval flag without moving
    /// the status.
    QmApprove,
    Close {
        verification_notes: Option<String>,
        lessons_learned: Option<String>,
    },
}

impl NcrMutation {
    /// The status the record must still hold when the write lands.
    pub fn expected_status(&self) -> &'static str {
        match self {
            NcrMutation::Respond { .. } => STATUS_OPEN,
            NcrMutation::ReviewAccept | NcrMutation::RequestRevision { .. } => STATUS_INVESTIGATING,
            NcrMutation::Rectify { .. } => STATUS_RECTIFICATION,
            NcrMutation::QmApprove | NcrMutation::Close { .. } => STATUS_VERIFICATION,
        }
    }

    /// The status the record holds after the mutation is applied.
    pub fn new_status(&self) -> &'static str {
        match self {
            NcrMutation::Respond { .. } => STATUS_INVESTIGATING,
            NcrMutation::ReviewAccept => STATUS_RECTIFICATION,
            NcrMutation::RequestRevision { .. } => STATUS_OPEN,
            NcrMutation::Rectify { .. } => STATUS_VERIFICATION,
            // Side-gate: status unchanged.
            NcrMutation::QmApprove => STATUS_VERIFICATION,
            NcrMutation::Close { .. } => crate::ncr_status::STATUS_CLOSED,
        }
    }

    /// Apply the mutation to an in-memory record.
    ///
    /// This is the reference semantics the SQL conditional update mirrors;
    /// the in-memory test store uses it directly.
    pub fn apply(&self, record: &mut NcrRecord, now: Timestamp) {
        record.status = self.new_status().to_string();
        record.updated_at = now;

        match self {
            NcrMutation::Respond {
                root_cause_category,
                root_cause_description,
                proposed_corrective_action,
            } => {
                record.root_cause_category = Some(root_cause_category.clone());
                record.root_cause_description = Some(root_cause_description.clone());
                record.proposed_corrective_action = Some(proposed_corrective_action.clone());
                record.revision_requested = false;
            }
            NcrMutation::ReviewAccept => {}
            NcrMutation::RequestRevision { comments } => {
                record.revision_requested = true;
                record.review_comments = Some(comments.clone());
            }
            NcrMutation::Rectify {
                rectification_notes,
            } => {
                record.rectification_notes = Some(rectification_notes.clone());
            }
            NcrMutation::QmApprove => {
                record.qm_approval_granted = true;
            }
            NcrMutation::Close {
                verification_notes,
                lessons_learned,
            } => {
                record.verification_notes = verification_notes.clone();
                record.lessons_learned = lessons_learned.clone();
                record.closed_at = Some(now);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// Evaluate a requested operation against the current record and actor.
pub fn evaluate(
    record: &NcrRecord,
    actor: &NcrActor,
    payload: &OperationPayload,
) -> Result<NcrMutation, CoreError> {
    // (1) Request shape, before the state is even consulted.
    if let OperationPayload::QmReview(review) = payload {
        if !VALID_REVIEW_ACTIONS.contains(&review.action.as_str()) {
            return Err(CoreError::Validation(format!(
                "Invalid review action '{}'. Must be one of: {}",
                review.action,
                VALID_REVIEW_ACTIONS.join(", ")
            )));
        }
    }

    // (2) State precondition.
    let required = payload.required_status();
    if record.status != required {
        return Err(CoreError::WrongState {
            operation: payload.operation(),
            required,
        });
    }

    match payload {
        OperationPayload::Respond(p) => {
            let root_cause_category = require_field(&p.root_cause_category, "root_cause_category")?;
            let root_cause_description =
                require_field(&p.root_cause_description, "root_cause_description")?;
            let proposed_corrective_action = require_field(
                &p.proposed_corrective_action,
                "proposed_corrective_action",
            )?;
            Ok(NcrMutation::Respond {
                root_cause_category,
                root_cause_description,
                proposed_corrective_action,
            })
        }

        OperationPayload::QmReview(p) => {
            if p.action == REVIEW_ACCEPT {
                require_quality_reviewer(actor)?;
                Ok(NcrMutation::ReviewAccept)
            } else {
                let comments = require_field(p.comments.as_deref().unwrap_or(""), "comments")?;
                require_quality_reviewer(actor)?;
                Ok(NcrMutation::RequestRevision { comments })
            }
        }

        OperationPayload::Rectify(p) => {
            let rectification_notes =
                require_field(&p.rectification_notes, "rectification_notes")?;
            Ok(NcrMutation::Rectify {
                rectification_notes,
            })
        }

        OperationPayload::QmApprove => {
            // The approval gate only exists for major severity; for minor
            // NCRs the flag is meaningless and the call is rejected.
            if !severity::requires_qm_approval(&record.severity) {
                return Err(CoreError::Validation(
                    "QM approval is not applicable to minor severity NCRs".to_string(),
                ));
            }
            require_quality_reviewer(actor)?;
            Ok(NcrMutation::QmApprove)
        }

        OperationPayload::Close(p) => {
            if severity::requires_qm_approval(&record.severity) && !record.qm_approval_granted {
                return Err(CoreError::Forbidden(
                    "Major NCR requires QM approval before closing".to_string(),
                ));
            }
            Ok(NcrMutation::Close {
                verification_notes: trim_optional(p.verification_notes.as_deref()),
                lessons_learned: trim_optional(p.lessons_learned.as_deref()),
            })
        }
    }
}

/// Reject with `Forbidden` unless the actor holds quality-review authority.
fn require_quality_reviewer(actor: &NcrActor) -> Result<(), CoreError> {
    if actor.quality_reviewer {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            "Quality reviewer role required".to_string(),
        ))
    }
}

/// Trim a required field, rejecting empty or whitespace-only values.
fn require_field(value: &str, name: &str) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(CoreError::Validation(format!("{name} must not be empty")))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Trim an optional field, mapping whitespace-only values to `None`.
fn trim_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ncr_status::{STATUS_CLOSED, VALID_STATUSES};
    use crate::roles::{NcrActor, ROLE_ENGINEER, ROLE_QUALITY_MANAGER};
    use crate::severity::{SEVERITY_MAJOR, SEVERITY_MINOR};

    fn record(status: &str, severity: &str) -> NcrRecord {
        let now = chrono::Utc::now();
        NcrRecord {
            id: 1,
            project_id: 10,
            ncr_number: 1,
            title: "Honeycombing in column C4".to_string(),
            description: None,
            severity: severity.to_string(),
            category: Some("concrete".to_string()),
            status: status.to_string(),
            revision_requested: false,
            qm_approval_granted: false,
            root_cause_category: None,
            root_cause_description: None,
            proposed_corrective_action: None,
            review_comments: None,
            rectification_notes: None,
            verification_notes: None,
            lessons_learned: None,
            raised_by_id: 5,
            responsible_user_id: Some(6),
            raised_at: now,
            due_date: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn engineer() -> NcrActor {
        NcrActor::from_role(6, ROLE_ENGINEER)
    }

    fn qm() -> NcrActor {
        NcrActor::from_role(7, ROLE_QUALITY_MANAGER)
    }

    fn respond_payload() -> OperationPayload {
        OperationPayload::Respond(RespondPayload {
            root_cause_category: "workmanship".to_string(),
            root_cause_description: "Insufficient vibration during pour".to_string(),
            proposed_corrective_action: "Chip out and re-pour affected section".to_string(),
        })
    }

    fn review_payload(action: &str, comments: Option<&str>) -> OperationPayload {
        OperationPayload::QmReview(QmReviewPayload {
            action: action.to_string(),
            comments: comments.map(str::to_string),
        })
    }

    // -- respond --------------------------------------------------------------

    #[test]
    fn respond_from_open_produces_respond_mutation() {
        let mutation = evaluate(
            &record(STATUS_OPEN, SEVERITY_MINOR),
            &engineer(),
            &respond_payload(),
        )
        .unwrap();
        assert_eq!(mutation.expected_status(), STATUS_OPEN);
        assert_eq!(mutation.new_status(), STATUS_INVESTIGATING);
    }

    #[test]
    fn respond_outside_open_is_wrong_state() {
        for status in [STATUS_INVESTIGATING, STATUS_RECTIFICATION, STATUS_VERIFICATION, STATUS_CLOSED] {
            let err = evaluate(
                &record(status, SEVERITY_MINOR),
                &engineer(),
                &respond_payload(),
            )
            .unwrap_err();
            assert_eq!(err.to_string(), "NCR is not in open status");
        }
    }

    #[test]
    fn respond_with_empty_fields_is_validation_error() {
        let payload = OperationPayload::Respond(RespondPayload {
            root_cause_category: "  ".to_string(),
            root_cause_description: "desc".to_string(),
            proposed_corrective_action: "action".to_string(),
        });
        let err = evaluate(&record(STATUS_OPEN, SEVERITY_MINOR), &engineer(), &payload).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(err.to_string().contains("root_cause_category"));
    }

    #[test]
    fn state_error_wins_over_content_error() {
        // Empty content against a record in the wrong state surfaces as a
        // state error, not a payload error.
        let payload = OperationPayload::Respond(RespondPayload {
            root_cause_category: String::new(),
            root_cause_description: String::new(),
            proposed_corrective_action: String::new(),
        });
        let err = evaluate(
            &record(STATUS_INVESTIGATING, SEVERITY_MINOR),
            &engineer(),
            &payload,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::WrongState { .. }));
    }

    #[test]
    fn respond_clears_revision_requested_and_overwrites_fields() {
        let mut rec = record(STATUS_OPEN, SEVERITY_MINOR);
        rec.revision_requested = true;
        rec.root_cause_category = Some("old".to_string());

        let mutation = evaluate(&rec, &engineer(), &respond_payload()).unwrap();
        mutation.apply(&mut rec, chrono::Utc::now());

        assert_eq!(rec.status, STATUS_INVESTIGATING);
        assert!(!rec.revision_requested);
        assert_eq!(rec.root_cause_category.as_deref(), Some("workmanship"));
    }

    // -- qm_review ------------------------------------------------------------

    #[test]
    fn review_accept_requires_quality_reviewer() {
        let rec = record(STATUS_INVESTIGATING, SEVERITY_MINOR);
        let err = evaluate(&rec, &engineer(), &review_payload(REVIEW_ACCEPT, None)).unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));

        let mutation = evaluate(&rec, &qm(), &review_payload(REVIEW_ACCEPT, None)).unwrap();
        assert_eq!(mutation, NcrMutation::ReviewAccept);
        assert_eq!(mutation.new_status(), STATUS_RECTIFICATION);
    }

    #[test]
    fn review_with_unknown_action_fails_shape_validation_before_state() {
        // Even in the wrong state the action error wins: it is a request
        // shape problem, not a workflow problem.
        let rec = record(STATUS_CLOSED, SEVERITY_MINOR);
        let err = evaluate(&rec, &qm(), &review_payload("escalate", None)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(err.to_string().contains("Invalid review action"));
    }

    #[test]
    fn revision_request_requires_comments() {
        let rec = record(STATUS_INVESTIGATING, SEVERITY_MINOR);
        let err = evaluate(&rec, &qm(), &review_payload(REVIEW_REQUEST_REVISION, None)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let err = evaluate(
            &rec,
            &qm(),
            &review_payload(REVIEW_REQUEST_REVISION, Some("   ")),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn revision_request_returns_record_to_open() {
        let mut rec = record(STATUS_INVESTIGATING, SEVERITY_MINOR);
        let mutation = evaluate(
            &rec,
            &qm(),
            &review_payload(REVIEW_REQUEST_REVISION, Some("Root cause too vague")),
        )
        .unwrap();
        mutation.apply(&mut rec, chrono::Utc::now());

        assert_eq!(rec.status, STATUS_OPEN);
        assert!(rec.revision_requested);
        assert_eq!(rec.review_comments.as_deref(), Some("Root cause too vague"));
    }

    #[test]
    fn review_outside_investigating_is_wrong_state() {
        let err = evaluate(
            &record(STATUS_OPEN, SEVERITY_MINOR),
            &qm(),
            &review_payload(REVIEW_ACCEPT, None),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "NCR is not in investigating status");
    }

    // -- rectify --------------------------------------------------------------

    #[test]
    fn rectify_requires_notes() {
        let rec = record(STATUS_RECTIFICATION, SEVERITY_MINOR);
        let payload = OperationPayload::Rectify(RectifyPayload {
            rectification_notes: String::new(),
        });
        assert!(matches!(
            evaluate(&rec, &engineer(), &payload),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn rectify_advances_to_verification() {
        let mut rec = record(STATUS_RECTIFICATION, SEVERITY_MINOR);
        let payload = OperationPayload::Rectify(RectifyPayload {
            rectification_notes: "Section re-poured and cured".to_string(),
        });
        let mutation = evaluate(&rec, &engineer(), &payload).unwrap();
        mutation.apply(&mut rec, chrono::Utc::now());
        assert_eq!(rec.status, STATUS_VERIFICATION);
        assert_eq!(
            rec.rectification_notes.as_deref(),
            Some("Section re-poured and cured")
        );
    }

    // -- qm_approve -----------------------------------------------------------

    #[test]
    fn qm_approve_sets_flag_without_moving_status() {
        let mut rec = record(STATUS_VERIFICATION, SEVERITY_MAJOR);
        let mutation = evaluate(&rec, &qm(), &OperationPayload::QmApprove).unwrap();
        assert_eq!(mutation.new_status(), STATUS_VERIFICATION);
        mutation.apply(&mut rec, chrono::Utc::now());
        assert_eq!(rec.status, STATUS_VERIFICATION);
        assert!(rec.qm_approval_granted);
    }

    #[test]
    fn qm_approve_is_idempotent_in_effect() {
        let mut rec = record(STATUS_VERIFICATION, SEVERITY_MAJOR);
        rec.qm_approval_granted = true;
        let mutation = evaluate(&rec, &qm(), &OperationPayload::QmApprove).unwrap();
        mutation.apply(&mut rec, chrono::Utc::now());
        assert!(rec.qm_approval_granted);
        assert_eq!(rec.status, STATUS_VERIFICATION);
    }

    #[test]
    fn qm_approve_on_minor_severity_is_rejected() {
        let rec = record(STATUS_VERIFICATION, SEVERITY_MINOR);
        let err = evaluate(&rec, &qm(), &OperationPayload::QmApprove).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(err.to_string().contains("not applicable to minor severity"));
    }

    #[test]
    fn qm_approve_requires_quality_reviewer() {
        let rec = record(STATUS_VERIFICATION, SEVERITY_MAJOR);
        assert!(matches!(
            evaluate(&rec, &engineer(), &OperationPayload::QmApprove),
            Err(CoreError::Forbidden(_))
        ));
    }

    // -- close ----------------------------------------------------------------

    fn close_payload() -> OperationPayload {
        OperationPayload::Close(ClosePayload {
            verification_notes: Some("Re-inspected, within tolerance".to_string()),
            lessons_learned: None,
        })
    }

    #[test]
    fn close_minor_needs_no_approval() {
        let mut rec = record(STATUS_VERIFICATION, SEVERITY_MINOR);
        let mutation = evaluate(&rec, &engineer(), &close_payload()).unwrap();
        mutation.apply(&mut rec, chrono::Utc::now());
        assert_eq!(rec.status, STATUS_CLOSED);
        assert!(rec.closed_at.is_some());
    }

    #[test]
    fn close_major_without_approval_is_forbidden() {
        let rec = record(STATUS_VERIFICATION, SEVERITY_MAJOR);
        let err = evaluate(&rec, &engineer(), &close_payload()).unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
        assert_eq!(
            err.to_string(),
            "Forbidden: Major NCR requires QM approval before closing"
        );
    }

    #[test]
    fn close_major_after_approval_succeeds() {
        let mut rec = record(STATUS_VERIFICATION, SEVERITY_MAJOR);
        rec.qm_approval_granted = true;
        let mutation = evaluate(&rec, &engineer(), &close_payload()).unwrap();
        mutation.apply(&mut rec, chrono::Utc::now());
        assert_eq!(rec.status, STATUS_CLOSED);
    }

    #[test]
    fn close_outside_verification_is_wrong_state() {
        let err = evaluate(
            &record(STATUS_OPEN, SEVERITY_MINOR),
            &engineer(),
            &close_payload(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "NCR is not in verification status");
    }

    #[test]
    fn nothing_leaves_closed() {
        let rec = record(STATUS_CLOSED, SEVERITY_MAJOR);
        let payloads = [
            respond_payload(),
            review_payload(REVIEW_ACCEPT, None),
            OperationPayload::Rectify(RectifyPayload {
                rectification_notes: "n".to_string(),
            }),
            OperationPayload::QmApprove,
            close_payload(),
        ];
        for payload in payloads {
            assert!(evaluate(&rec, &qm(), &payload).is_err());
        }
    }

    // -- transition-table property --------------------------------------------

    #[test]
    fn every_mutation_follows_a_table_edge() {
        use crate::ncr_status::valid_transitions;

        let mutations = [
            NcrMutation::Respond {
                root_cause_category: "c".to_string(),
                root_cause_description: "d".to_string(),
                proposed_corrective_action: "a".to_string(),
            },
            NcrMutation::ReviewAccept,
            NcrMutation::RequestRevision {
                comments: "c".to_string(),
            },
            NcrMutation::Rectify {
                rectification_notes: "n".to_string(),
            },
            NcrMutation::QmApprove,
            NcrMutation::Close {
                verification_notes: None,
                lessons_learned: None,
            },
        ];
        for m in &mutations {
            assert!(VALID_STATUSES.contains(&m.expected_status()));
            assert!(VALID_STATUSES.contains(&m.new_status()));
            // Status either stays put (side-gate) or follows a table edge.
            if m.expected_status() != m.new_status() {
                assert!(
                    valid_transitions(m.expected_status()).contains(&m.new_status()),
                    "{m:?} is not a table edge"
                );
            }
        }
    }
}
