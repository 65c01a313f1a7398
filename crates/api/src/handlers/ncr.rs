//! Handlers for the `/ncrs` resource.
//!
//! All endpoints require authentication via [`AuthUser`]. Workflow
//! transitions go through the engine; nothing here writes `status`,
//! `revision_requested`, or `qm_approval_granted` directly.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use siteqms_core::error::CoreError;
use siteqms_core::types::{DbId, Timestamp};
use siteqms_core::workflow::{
    ClosePayload, OperationPayload, QmReviewPayload, RectifyPayload, RespondPayload,
};
use siteqms_core::{ncr_status, severity};
use siteqms_db::models::ncr::{CreateNcr, CreateNcrEvidence, Ncr};
use siteqms_db::repositories::{NcrEvidenceRepo, NcrLotRepo, NcrRepo};
use siteqms_events::bus::EVENT_NCR_RAISED;
use siteqms_events::NcrEvent;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / query types
// ---------------------------------------------------------------------------

/// Body for `POST /projects/{project_id}/ncrs`.
#[derive(Debug, Deserialize)]
pub struct CreateNcrRequest {
    pub title: String,
    pub description: Option<String>,
    pub severity: String,
    pub category: Option<String>,
    pub responsible_user_id: Option<DbId>,
    pub due_date: Option<Timestamp>,
}

/// Query parameters for `GET /projects/{project_id}/ncrs`.
#[derive(Debug, Deserialize)]
pub struct NcrListQuery {
    /// Optional status filter.
    pub status: Option<String>,
}

// ---------------------------------------------------------------------------
// Creation / retrieval
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{project_id}/ncrs
///
/// Raise a new NCR in `open` status. The per-project NCR number is assigned
/// server-side; severity is fixed from here on.
pub async fn create_ncr(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(body): Json<CreateNcrRequest>,
) -> AppResult<impl IntoResponse> {
    let title = body.title.trim();
    if title.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "title must not be empty".to_string(),
        )));
    }
    severity::validate_severity(&body.severity).map_err(AppError::Core)?;

    let input = CreateNcr {
        project_id,
        title: title.to_string(),
        description: body.description,
        severity: body.severity,
        category: body.category,
        raised_by_id: auth.user_id,
        responsible_user_id: body.responsible_user_id,
        due_date: body.due_date,
    };

    let ncr = NcrRepo::create(&state.pool, &input).await?;

    tracing::info!(
        ncr_id = ncr.id,
        project_id,
        ncr_number = ncr.ncr_number,
        severity = %ncr.severity,
        "NCR raised"
    );

    state.event_bus.publish(
        NcrEvent::new(EVENT_NCR_RAISED, ncr.id, ncr.project_id, ncr.ncr_number)
            .with_actor(auth.user_id)
            .with_recipient(ncr.responsible_user_id)
            .with_payload(serde_json::json!({
                "severity": ncr.severity,
                "title": ncr.title,
            })),
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: ncr })))
}

/// GET /api/v1/projects/{project_id}/ncrs
///
/// List a project's NCRs, newest first, optionally filtered by status.
pub async fn list_ncrs(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Query(params): Query<NcrListQuery>,
) -> AppResult<Json<DataResponse<Vec<Ncr>>>> {
    if let Some(status) = &params.status {
        ncr_status::validate_status(status).map_err(AppError::Core)?;
    }

    let ncrs = NcrRepo::list_by_project(&state.pool, project_id, params.status.as_deref()).await?;

    Ok(Json(DataResponse { data: ncrs }))
}

/// GET /api/v1/ncrs/{id}
pub async fn get_ncr(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(ncr_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Ncr>>> {
    let ncr = require_ncr(&state, ncr_id).await?;
    Ok(Json(DataResponse { data: ncr }))
}

// ---------------------------------------------------------------------------
// Workflow operations
// ---------------------------------------------------------------------------

/// POST /api/v1/ncrs/{id}/respond
///
/// Submit the root-cause response, moving the NCR to `investigating`.
pub async fn respond(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(ncr_id): Path<DbId>,
    Json(body): Json<RespondPayload>,
) -> AppResult<Json<DataResponse<siteqms_core::ncr::NcrRecord>>> {
    execute_operation(&state, &auth, ncr_id, OperationPayload::Respond(body)).await
}

/// POST /api/v1/ncrs/{id}/review
///
/// QM decision on the submitted response: accept moves to `rectification`,
/// request_revision returns the NCR to `open`.
pub async fn review(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(ncr_id): Path<DbId>,
    Json(body): Json<QmReviewPayload>,
) -> AppResult<Json<DataResponse<siteqms_core::ncr::NcrRecord>>> {
    execute_operation(&state, &auth, ncr_id, OperationPayload::QmReview(body)).await
}

/// POST /api/v1/ncrs/{id}/rectify
///
/// Record the rectification work, moving the NCR to `verification`.
pub async fn rectify(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(ncr_id): Path<DbId>,
    Json(body): Json<RectifyPayload>,
) -> AppResult<Json<DataResponse<siteqms_core::ncr::NcrRecord>>> {
    execute_operation(&state, &auth, ncr_id, OperationPayload::Rectify(body)).await
}

/// POST /api/v1/ncrs/{id}/approve
///
/// Grant closure approval on a major NCR. The status is unchanged; only
/// the approval flag moves.
pub async fn approve(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(ncr_id): Path<DbId>,
) -> AppResult<Json<DataResponse<siteqms_core::ncr::NcrRecord>>> {
    execute_operation(&state, &auth, ncr_id, OperationPayload::QmApprove).await
}

/// POST /api/v1/ncrs/{id}/close
///
/// Close a verified NCR. Major severity requires a prior QM approval.
pub async fn close(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(ncr_id): Path<DbId>,
    Json(body): Json<ClosePayload>,
) -> AppResult<Json<DataResponse<siteqms_core::ncr::NcrRecord>>> {
    execute_operation(&state, &auth, ncr_id, OperationPayload::Close(body)).await
}

/// Run one workflow operation through the engine and wrap the result.
async fn execute_operation(
    state: &AppState,
    auth: &AuthUser,
    ncr_id: DbId,
    payload: OperationPayload,
) -> AppResult<Json<DataResponse<siteqms_core::ncr::NcrRecord>>> {
    let record = state
        .engine
        .execute(ncr_id, &auth.actor(), &payload)
        .await
        .map_err(AppError::Core)?;
    Ok(Json(DataResponse { data: record }))
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// POST /api/v1/ncrs/{id}/evidence
///
/// Attach evidence metadata to an NCR. Allowed in any status; evidence is
/// audit material and never affects transitions.
pub async fn add_evidence(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(ncr_id): Path<DbId>,
    Json(body): Json<CreateNcrEvidence>,
) -> AppResult<impl IntoResponse> {
    if body.file_path.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "file_path must not be empty".to_string(),
        )));
    }

    require_ncr(&state, ncr_id).await?;

    let evidence = NcrEvidenceRepo::create(&state.pool, ncr_id, auth.user_id, &body).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: evidence })))
}

/// GET /api/v1/ncrs/{id}/evidence
pub async fn list_evidence(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(ncr_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<siteqms_db::models::ncr::NcrEvidence>>>> {
    require_ncr(&state, ncr_id).await?;
    let evidence = NcrEvidenceRepo::list_for_ncr(&state.pool, ncr_id).await?;
    Ok(Json(DataResponse { data: evidence }))
}

// ---------------------------------------------------------------------------
// Lot links
// ---------------------------------------------------------------------------

/// PUT /api/v1/ncrs/{id}/lots/{lot_id}
///
/// Link the NCR to a lot. Idempotent.
pub async fn link_lot(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path((ncr_id, lot_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    require_ncr(&state, ncr_id).await?;
    NcrLotRepo::link(&state.pool, ncr_id, lot_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/ncrs/{id}/lots/{lot_id}
pub async fn unlink_lot(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path((ncr_id, lot_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    let removed = NcrLotRepo::unlink(&state.pool, ncr_id, lot_id).await?;
    if !removed {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "NcrLotLink",
            id: ncr_id,
        }));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/ncrs/{id}/lots
pub async fn list_lots(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(ncr_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<siteqms_db::models::ncr::NcrLotLink>>>> {
    require_ncr(&state, ncr_id).await?;
    let links = NcrLotRepo::list_for_ncr(&state.pool, ncr_id).await?;
    Ok(Json(DataResponse { data: links }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load an NCR row or fail with 404.
async fn require_ncr(state: &AppState, ncr_id: DbId) -> AppResult<Ncr> {
    NcrRepo::find_by_id(&state.pool, ncr_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Ncr",
            id: ncr_id,
        }))
}
