//! Storage port for the workflow engine.
//!
//! The NCR record store is an external collaborator; the engine only needs
//! a point read and an atomic conditional write keyed on the record's
//! current status. `siteqms-db` provides the PostgreSQL implementation;
//! tests drive the engine against an in-memory one.

use async_trait::async_trait;
use siteqms_core::ncr::NcrRecord;
use siteqms_core::types::DbId;
use siteqms_core::workflow::NcrMutation;

/// Errors surfaced by an [`NcrStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The conditional write found the record in a different status than
    /// expected -- a concurrent transition won the race.
    #[error("record status did not match the expected status")]
    VersionConflict,

    /// Backend failure (connection loss, SQL error, ...). The engine wraps
    /// this into `CoreError::Internal`; the raw error never reaches callers.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Transactional record store for NCRs.
#[async_trait]
pub trait NcrStore: Send + Sync {
    /// Load a record by id. Returns `Ok(None)` when the id is unknown.
    async fn load(&self, id: DbId) -> Result<Option<NcrRecord>, StoreError>;

    /// Atomically apply `mutation` if and only if the record still holds
    /// `expected_status`, returning the updated record.
    ///
    /// Implementations must guarantee that of two concurrent calls against
    /// the same record, at most one observes the expected status; the other
    /// gets [`StoreError::VersionConflict`] -- never a silent overwrite.
    async fn apply(
        &self,
        id: DbId,
        expected_status: &str,
        mutation: &NcrMutation,
    ) -> Result<NcrRecord, StoreError>;
}
