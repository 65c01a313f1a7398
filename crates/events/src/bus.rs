//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the hub the workflow engine publishes [`NcrEvent`]s to.
//! It is designed to be shared via `Arc<EventBus>`. Publishing is
//! synchronous and infallible from the publisher's point of view; delivery
//! is the consumers' problem, which is exactly what the workflow needs --
//! a notification failure must never roll back a persisted transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siteqms_core::types::DbId;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// A new NCR was raised.
pub const EVENT_NCR_RAISED: &str = "ncr.raised";
/// A root-cause response was submitted.
pub const EVENT_NCR_RESPONDED: &str = "ncr.responded";
/// QM accepted the proposed corrective action.
pub const EVENT_NCR_REVIEW_ACCEPTED: &str = "ncr.review_accepted";
/// QM sent the NCR back for a fresh response.
pub const EVENT_NCR_REVISION_REQUESTED: &str = "ncr.revision_requested";
/// Rectification work was recorded.
pub const EVENT_NCR_RECTIFIED: &str = "ncr.rectified";
/// QM granted closure approval on a major NCR.
pub const EVENT_NCR_QM_APPROVED: &str = "ncr.qm_approved";
/// The NCR was closed.
pub const EVENT_NCR_CLOSED: &str = "ncr.closed";

// ---------------------------------------------------------------------------
// NcrEvent
// ---------------------------------------------------------------------------

/// A notification intent describing one workflow transition.
///
/// Constructed via [`NcrEvent::new`] and enriched with the builder methods
/// [`with_actor`](NcrEvent::with_actor),
/// [`with_recipient`](NcrEvent::with_recipient), and
/// [`with_payload`](NcrEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NcrEvent {
    /// Dot-separated event kind, e.g. `"ncr.closed"`.
    pub kind: String,

    /// The NCR the event concerns.
    pub ncr_id: DbId,

    /// The project the NCR belongs to.
    pub project_id: DbId,

    /// The per-project NCR number, for human-readable notifications.
    pub ncr_number: i32,

    /// The user whose action produced the event.
    pub actor_user_id: Option<DbId>,

    /// Explicit recipient, when the transition names one (e.g. the
    /// responsible user on a revision request). `None` means the consumer
    /// decides the fan-out from the kind.
    pub recipient_user_id: Option<DbId>,

    /// Free-form JSON metadata carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl NcrEvent {
    /// Create a new event for the given kind and NCR.
    pub fn new(kind: impl Into<String>, ncr_id: DbId, project_id: DbId, ncr_number: i32) -> Self {
        Self {
            kind: kind.into(),
            ncr_id,
            project_id,
            ncr_number,
            actor_user_id: None,
            recipient_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the acting user to the event.
    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    /// Attach an explicit recipient to the event.
    pub fn with_recipient(mut self, user_id: Option<DbId>) -> Self {
        self.recipient_user_id = user_id;
        self
    }

    /// Set the JSON metadata payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`NcrEvent`].
pub struct EventBus {
    sender: broadcast::Sender<NcrEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: NcrEvent) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<NcrEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let event = NcrEvent::new(EVENT_NCR_CLOSED, 42, 10, 7)
            .with_actor(5)
            .with_recipient(Some(9))
            .with_payload(serde_json::json!({"severity": "major"}));

        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.kind, EVENT_NCR_CLOSED);
        assert_eq!(received.ncr_id, 42);
        assert_eq!(received.project_id, 10);
        assert_eq!(received.ncr_number, 7);
        assert_eq!(received.actor_user_id, Some(5));
        assert_eq!(received.recipient_user_id, Some(9));
        assert_eq!(received.payload["severity"], "major");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(NcrEvent::new(EVENT_NCR_RAISED, 1, 1, 1));

        assert_eq!(rx1.recv().await.unwrap().kind, EVENT_NCR_RAISED);
        assert_eq!(rx2.recv().await.unwrap().kind, EVENT_NCR_RAISED);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        // No subscribers -- this must not panic.
        bus.publish(NcrEvent::new(EVENT_NCR_RESPONDED, 1, 1, 1));
    }

    #[test]
    fn new_event_has_empty_optional_fields() {
        let event = NcrEvent::new(EVENT_NCR_RECTIFIED, 3, 2, 11);
        assert!(event.actor_user_id.is_none());
        assert!(event.recipient_user_id.is_none());
        assert!(event.payload.is_object());
    }
}
