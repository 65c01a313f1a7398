//! PostgreSQL-backed implementation of the workflow engine's storage port.

use async_trait::async_trait;
use siteqms_core::ncr::NcrRecord;
use siteqms_core::types::DbId;
use siteqms_core::workflow::NcrMutation;
use siteqms_engine::{NcrStore, StoreError};

use crate::repositories::NcrRepo;
use crate::DbPool;

/// [`NcrStore`] backed by the `ncrs` table.
///
/// `apply` maps directly onto the conditional UPDATE in
/// [`NcrRepo::conditional_update`]; a zero-row result is surfaced as
/// [`StoreError::VersionConflict`] so the engine can retry against fresh
/// state.
#[derive(Clone)]
pub struct PgNcrStore {
    pool: DbPool,
}

impl PgNcrStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NcrStore for PgNcrStore {
    async fn load(&self, id: DbId) -> Result<Option<NcrRecord>, StoreError> {
        NcrRepo::find_by_id(&self.pool, id)
            .await
            .map(|row| row.map(Into::into))
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn apply(
        &self,
        id: DbId,
        expected_status: &str,
        mutation: &NcrMutation,
    ) -> Result<NcrRecord, StoreError> {
        match NcrRepo::conditional_update(&self.pool, id, expected_status, mutation).await {
            Ok(Some(row)) => Ok(row.into()),
            Ok(None) => Err(StoreError::VersionConflict),
            Err(e) => Err(StoreError::Backend(e.to_string())),
        }
    }
}
