//! Workflow orchestration.
//!
//! [`WorkflowEngine::execute`] is the single write path for NCR workflow
//! state. Every transition goes load -> guard -> conditional write ->
//! event emit; nothing else may touch `status`, `revision_requested`, or
//! `qm_approval_granted`.

use std::sync::Arc;

use siteqms_core::error::CoreError;
use siteqms_core::ncr::NcrRecord;
use siteqms_core::roles::NcrActor;
use siteqms_core::types::DbId;
use siteqms_core::workflow::{self, NcrMutation, OperationPayload};
use siteqms_events::bus::{
    EVENT_NCR_CLOSED, EVENT_NCR_QM_APPROVED, EVENT_NCR_RECTIFIED, EVENT_NCR_RESPONDED,
    EVENT_NCR_REVIEW_ACCEPTED, EVENT_NCR_REVISION_REQUESTED,
};
use siteqms_events::{EventBus, NcrEvent};

use crate::store::{NcrStore, StoreError};

/// Orchestrates NCR workflow transitions against a record store.
///
/// Cheap to share behind an `Arc`; holds no per-request state.
pub struct WorkflowEngine<S> {
    store: S,
    events: Arc<EventBus>,
}

impl<S: NcrStore> WorkflowEngine<S> {
    /// Create an engine over the given store and event bus.
    pub fn new(store: S, events: Arc<EventBus>) -> Self {
        Self { store, events }
    }

    /// The underlying record store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute one workflow operation against the NCR with id `ncr_id`.
    ///
    /// On success returns the updated record (for `qm_approve` the status
    /// is unchanged and only the approval flag moves). All rejections are
    /// typed [`CoreError`]s; storage errors are wrapped, never leaked.
    ///
    /// A lost compare-and-swap race is retried exactly once against the
    /// freshly loaded record; a second conflict surfaces as
    /// `CoreError::Conflict`.
    pub async fn execute(
        &self,
        ncr_id: DbId,
        actor: &NcrActor,
        payload: &OperationPayload,
    ) -> Result<NcrRecord, CoreError> {
        let record = self.load_required(ncr_id).await?;
        let mutation = workflow::evaluate(&record, actor, payload)?;

        let (updated, mutation) = match self
            .store
            .apply(ncr_id, mutation.expected_status(), &mutation)
            .await
        {
            Ok(updated) => (updated, mutation),
            Err(StoreError::VersionConflict) => {
                tracing::debug!(
                    ncr_id,
                    operation = payload.operation(),
                    "Lost conditional write race, re-evaluating against fresh state"
                );
                let fresh = self.load_required(ncr_id).await?;
                let mutation = workflow::evaluate(&fresh, actor, payload)?;
                let updated = self
                    .store
                    .apply(ncr_id, mutation.expected_status(), &mutation)
                    .await
                    .map_err(|e| match e {
                        StoreError::VersionConflict => {
                            CoreError::Conflict("NCR was modified concurrently".to_string())
                        }
                        StoreError::Backend(msg) => CoreError::Internal(msg),
                    })?;
                (updated, mutation)
            }
            Err(StoreError::Backend(msg)) => return Err(CoreError::Internal(msg)),
        };

        tracing::info!(
            ncr_id,
            operation = payload.operation(),
            status = %updated.status,
            actor_user_id = actor.user_id,
            "NCR workflow transition applied"
        );

        self.emit(actor, &mutation, &updated);
        Ok(updated)
    }

    /// Load a record, mapping absence to `NotFound` and backend failures
    /// to `Internal`.
    async fn load_required(&self, ncr_id: DbId) -> Result<NcrRecord, CoreError> {
        self.store
            .load(ncr_id)
            .await
            .map_err(|e| CoreError::Internal(e.to_string()))?
            .ok_or(CoreError::NotFound {
                entity: "Ncr",
                id: ncr_id,
            })
    }

    /// Publish the notification intent for a completed transition.
    ///
    /// Fire-and-forget: the bus never blocks and a missing consumer never
    /// affects the already-persisted state change.
    fn emit(&self, actor: &NcrActor, mutation: &NcrMutation, record: &NcrRecord) {
        let (kind, recipient) = match mutation {
            // Responses and rectifications await a QM; the notification
            // router fans these out to quality reviewers.
            NcrMutation::Respond { .. } => (EVENT_NCR_RESPONDED, None),
            NcrMutation::Rectify { .. } => (EVENT_NCR_RECTIFIED, None),
            // QM decisions go back to the people working the NCR.
            NcrMutation::ReviewAccept => (
                EVENT_NCR_REVIEW_ACCEPTED,
                record.responsible_user_id.or(Some(record.raised_by_id)),
            ),
            NcrMutation::RequestRevision { .. } => (
                EVENT_NCR_REVISION_REQUESTED,
                record.responsible_user_id.or(Some(record.raised_by_id)),
            ),
            NcrMutation::QmApprove => (EVENT_NCR_QM_APPROVED, Some(record.raised_by_id)),
            NcrMutation::Close { .. } => (EVENT_NCR_CLOSED, Some(record.raised_by_id)),
        };

        let event = NcrEvent::new(kind, record.id, record.project_id, record.ncr_number)
            .with_actor(actor.user_id)
            .with_recipient(recipient)
            .with_payload(serde_json::json!({
                "status": record.status,
                "severity": record.severity,
            }));

        self.events.publish(event);
    }
}
