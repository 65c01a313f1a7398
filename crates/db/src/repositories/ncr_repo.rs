//! Repository for the `ncrs` and `ncr_counters` tables.

use siteqms_core::types::DbId;
use siteqms_core::workflow::NcrMutation;
use sqlx::PgPool;

use crate::models::ncr::{CreateNcr, Ncr};

/// Column list for ncrs queries.
const NCR_COLUMNS: &str = "id, project_id, ncr_number, title, description, severity, category, \
    status, revision_requested, qm_approval_granted, root_cause_category, \
    root_cause_description, proposed_corrective_action, review_comments, rectification_notes, \
    verification_notes, lessons_learned, raised_by_id, responsible_user_id, raised_at, \
    due_date, closed_at, created_at, updated_at";

/// Provides CRUD and conditional-update operations for NCRs.
pub struct NcrRepo;

impl NcrRepo {
    /// Insert a new NCR in `open` status, assigning the next sequential
    /// number for the project.
    ///
    /// The number comes from an atomic upsert on `ncr_counters`, so it is
    /// unique and monotonic per project and never reused even if the NCR
    /// is later considered invalid (there is no hard-delete path).
    pub async fn create(pool: &PgPool, input: &CreateNcr) -> Result<Ncr, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let next_number: i32 = sqlx::query_scalar(
            "INSERT INTO ncr_counters (project_id, last_number)
             VALUES ($1, 1)
             ON CONFLICT (project_id)
             DO UPDATE SET last_number = ncr_counters.last_number + 1
             RETURNING last_number",
        )
        .bind(input.project_id)
        .fetch_one(&mut *tx)
        .await?;

        let query = format!(
            "INSERT INTO ncrs
                (project_id, ncr_number, title, description, severity, category,
                 raised_by_id, responsible_user_id, due_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {NCR_COLUMNS}"
        );
        let ncr = sqlx::query_as::<_, Ncr>(&query)
            .bind(input.project_id)
            .bind(next_number)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.severity)
            .bind(&input.category)
            .bind(input.raised_by_id)
            .bind(input.responsible_user_id)
            .bind(input.due_date)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ncr)
    }

    /// Find an NCR by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Ncr>, sqlx::Error> {
        let query = format!("SELECT {NCR_COLUMNS} FROM ncrs WHERE id = $1");
        sqlx::query_as::<_, Ncr>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List NCRs for a project, newest first, optionally filtered by status.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: DbId,
        status: Option<&str>,
    ) -> Result<Vec<Ncr>, sqlx::Error> {
        match status {
            Some(status) => {
                let query = format!(
                    "SELECT {NCR_COLUMNS} FROM ncrs
                     WHERE project_id = $1 AND status = $2
                     ORDER BY ncr_number DESC"
                );
                sqlx::query_as::<_, Ncr>(&query)
                    .bind(project_id)
                    .bind(status)
                    .fetch_all(pool)
                    .await
            }
            None => {
                let query = format!(
                    "SELECT {NCR_COLUMNS} FROM ncrs
                     WHERE project_id = $1
                     ORDER BY ncr_number DESC"
                );
                sqlx::query_as::<_, Ncr>(&query)
                    .bind(project_id)
                    .fetch_all(pool)
                    .await
            }
        }
    }

    /// Apply a workflow mutation with a compare-and-swap on the current
    /// status.
    ///
    /// Returns `Ok(None)` when no row matched `id AND status =
    /// expected_status` -- the caller treats that as a version conflict.
    /// This single statement is what serializes concurrent transition
    /// attempts: exactly one writer observes the pre-transition status.
    pub async fn conditional_update(
        pool: &PgPool,
        id: DbId,
        expected_status: &str,
        mutation: &NcrMutation,
    ) -> Result<Option<Ncr>, sqlx::Error> {
        match mutation {
            NcrMutation::Respond {
                root_cause_category,
                root_cause_description,
                proposed_corrective_action,
            } => {
                let query = format!(
                    "UPDATE ncrs SET
                        status = $3,
                        revision_requested = FALSE,
                        root_cause_category = $4,
                        root_cause_description = $5,
                        proposed_corrective_action = $6,
                        updated_at = NOW()
                     WHERE id = $1 AND status = $2
                     RETURNING {NCR_COLUMNS}"
                );
                sqlx::query_as::<_, Ncr>(&query)
                    .bind(id)
                    .bind(expected_status)
                    .bind(mutation.new_status())
                    .bind(root_cause_category)
                    .bind(root_cause_description)
                    .bind(proposed_corrective_action)
                    .fetch_optional(pool)
                    .await
            }

            NcrMutation::ReviewAccept => {
                let query = format!(
                    "UPDATE ncrs SET status = $3, updated_at = NOW()
                     WHERE id = $1 AND status = $2
                     RETURNING {NCR_COLUMNS}"
                );
                sqlx::query_as::<_, Ncr>(&query)
                    .bind(id)
                    .bind(expected_status)
                    .bind(mutation.new_status())
                    .fetch_optional(pool)
                    .await
            }

            NcrMutation::RequestRevision { comments } => {
                let query = format!(
                    "UPDATE ncrs SET
                        status = $3,
                        revision_requested = TRUE,
                        review_comments = $4,
                        updated_at = NOW()
                     WHERE id = $1 AND status = $2
                     RETURNING {NCR_COLUMNS}"
                );
                sqlx::query_as::<_, Ncr>(&query)
                    .bind(id)
                    .bind(expected_status)
                    .bind(mutation.new_status())
                    .bind(comments)
                    .fetch_optional(pool)
                    .await
            }

            NcrMutation::Rectify {
                rectification_notes,
            } => {
                let query = format!(
                    "UPDATE ncrs SET
                        status = $3,
                        rectification_notes = $4,
                        updated_at = NOW()
                     WHERE id = $1 AND status = $2
                     RETURNING {NCR_COLUMNS}"
                );
                sqlx::query_as::<_, Ncr>(&query)
                    .bind(id)
                    .bind(expected_status)
                    .bind(mutation.new_status())
                    .bind(rectification_notes)
                    .fetch_optional(pool)
                    .await
            }

            NcrMutation::QmApprove => {
                // Side-gate: the status is unchanged but still guards the
                // write, so a concurrent close cannot interleave.
                let query = format!(
                    "UPDATE ncrs SET qm_approval_granted = TRUE, updated_at = NOW()
                     WHERE id = $1 AND status = $2
                     RETURNING {NCR_COLUMNS}"
                );
                sqlx::query_as::<_, Ncr>(&query)
                    .bind(id)
                    .bind(expected_status)
                    .fetch_optional(pool)
                    .await
            }

            NcrMutation::Close {
                verification_notes,
                lessons_learned,
            } => {
                let query = format!(
                    "UPDATE ncrs SET
                        status = $3,
                        verification_notes = $4,
                        lessons_learned = $5,
                        closed_at = NOW(),
                        updated_at = NOW()
                     WHERE id = $1 AND status = $2
                     RETURNING {NCR_COLUMNS}"
                );
                sqlx::query_as::<_, Ncr>(&query)
                    .bind(id)
                    .bind(expected_status)
                    .bind(mutation.new_status())
                    .bind(verification_notes)
                    .bind(lessons_learned)
                    .fetch_optional(pool)
                    .await
            }
        }
    }
}
