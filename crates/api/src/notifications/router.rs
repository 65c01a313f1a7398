//! Event-to-notification routing.
//!
//! [`NcrNotificationRouter`] subscribes to the event bus and delivers an
//! email for each workflow event. Delivery is strictly best-effort: a
//! failure is logged and never propagated, because the transition the
//! event describes has already been persisted.

use siteqms_core::roles::{ROLE_ADMIN, ROLE_QUALITY_MANAGER};
use siteqms_core::types::DbId;
use siteqms_db::DbPool;
use siteqms_events::{EmailDelivery, NcrEvent};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Routes workflow events to user notifications.
///
/// Events carrying an explicit recipient go to that user; events without
/// one (responses and rectifications awaiting review) fan out to all
/// active quality managers and admins.
pub struct NcrNotificationRouter {
    pool: DbPool,
    email: Option<EmailDelivery>,
}

impl NcrNotificationRouter {
    /// Create a router. `email` is `None` when SMTP is not configured, in
    /// which case events are consumed and logged but nothing is sent.
    pub fn new(pool: DbPool, email: Option<EmailDelivery>) -> Self {
        Self { pool, email }
    }

    /// Run the main routing loop until the bus closes or `cancel` fires.
    pub async fn run(self, mut receiver: broadcast::Receiver<NcrEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                result = receiver.recv() => match result {
                    Ok(event) => self.route_event(&event).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Notification router lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, notification router shutting down");
                        break;
                    }
                },
                () = cancel.cancelled() => {
                    tracing::info!("Notification router cancelled");
                    break;
                }
            }
        }
    }

    /// Deliver one event to every target user.
    async fn route_event(&self, event: &NcrEvent) {
        let targets = match self.determine_targets(event).await {
            Ok(targets) => targets,
            Err(e) => {
                tracing::error!(error = %e, kind = %event.kind, "Failed to resolve notification targets");
                return;
            }
        };

        for user_id in targets {
            self.deliver_to_user(user_id, event).await;
        }
    }

    /// Determine which users should be notified about the event.
    ///
    /// An explicit recipient wins; otherwise the event is awaiting a QM
    /// decision and fans out to the quality reviewers.
    async fn determine_targets(&self, event: &NcrEvent) -> Result<Vec<DbId>, sqlx::Error> {
        if let Some(recipient) = event.recipient_user_id {
            return Ok(vec![recipient]);
        }
        self.get_quality_reviewer_ids().await
    }

    /// Query all active users with quality-review authority.
    async fn get_quality_reviewer_ids(&self) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT id FROM users \
             WHERE (role = $1 OR role = $2) AND is_active = TRUE",
        )
        .bind(ROLE_QUALITY_MANAGER)
        .bind(ROLE_ADMIN)
        .fetch_all(&self.pool)
        .await
    }

    /// Resolve the user's email address and send, logging any failure.
    async fn deliver_to_user(&self, user_id: DbId, event: &NcrEvent) {
        let Some(email) = &self.email else {
            tracing::debug!(user_id, kind = %event.kind, "Email not configured, skipping delivery");
            return;
        };

        let address: Option<String> = match sqlx::query_scalar(
            "SELECT email FROM users WHERE id = $1 AND is_active = TRUE",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        {
            Ok(address) => address,
            Err(e) => {
                tracing::error!(error = %e, user_id, "Failed to look up notification address");
                return;
            }
        };

        let Some(address) = address else {
            tracing::debug!(user_id, "No active user for notification, skipping");
            return;
        };

        if let Err(e) = email.deliver(&address, event).await {
            tracing::error!(error = %e, user_id, kind = %event.kind, "Notification email failed");
        }
    }
}
