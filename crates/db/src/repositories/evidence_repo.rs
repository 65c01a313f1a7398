//! Repositories for NCR evidence attachments and lot links.

use siteqms_core::types::DbId;
use sqlx::PgPool;

use crate::models::ncr::{CreateNcrEvidence, NcrEvidence, NcrLotLink};

const EVIDENCE_COLUMNS: &str = "id, ncr_id, file_path, caption, uploaded_by_id, created_at";

/// Evidence attachments for an NCR.
pub struct NcrEvidenceRepo;

impl NcrEvidenceRepo {
    /// Attach an evidence record to an NCR.
    pub async fn create(
        pool: &PgPool,
        ncr_id: DbId,
        uploaded_by_id: DbId,
        input: &CreateNcrEvidence,
    ) -> Result<NcrEvidence, sqlx::Error> {
        let query = format!(
            "INSERT INTO ncr_evidence (ncr_id, file_path, caption, uploaded_by_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {EVIDENCE_COLUMNS}"
        );
        sqlx::query_as::<_, NcrEvidence>(&query)
            .bind(ncr_id)
            .bind(&input.file_path)
            .bind(&input.caption)
            .bind(uploaded_by_id)
            .fetch_one(pool)
            .await
    }

    /// List evidence for an NCR, oldest first.
    pub async fn list_for_ncr(pool: &PgPool, ncr_id: DbId) -> Result<Vec<NcrEvidence>, sqlx::Error> {
        let query = format!(
            "SELECT {EVIDENCE_COLUMNS} FROM ncr_evidence
             WHERE ncr_id = $1
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, NcrEvidence>(&query)
            .bind(ncr_id)
            .fetch_all(pool)
            .await
    }
}

/// Many-to-many links between NCRs and lots.
pub struct NcrLotRepo;

impl NcrLotRepo {
    /// Link an NCR to a lot. Linking the same pair twice is a no-op.
    pub async fn link(pool: &PgPool, ncr_id: DbId, lot_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO ncr_lot_links (ncr_id, lot_id)
             VALUES ($1, $2)
             ON CONFLICT (ncr_id, lot_id) DO NOTHING",
        )
        .bind(ncr_id)
        .bind(lot_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Remove a link. Returns whether a row was deleted.
    pub async fn unlink(pool: &PgPool, ncr_id: DbId, lot_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM ncr_lot_links WHERE ncr_id = $1 AND lot_id = $2")
            .bind(ncr_id)
            .bind(lot_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List the lots linked to an NCR.
    pub async fn list_for_ncr(pool: &PgPool, ncr_id: DbId) -> Result<Vec<NcrLotLink>, sqlx::Error> {
        sqlx::query_as::<_, NcrLotLink>(
            "SELECT ncr_id, lot_id, created_at FROM ncr_lot_links
             WHERE ncr_id = $1
             ORDER BY created_at ASC",
        )
        .bind(ncr_id)
        .fetch_all(pool)
        .await
    }
}
