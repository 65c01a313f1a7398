use std::sync::Arc;

use siteqms_db::PgNcrStore;
use siteqms_engine::WorkflowEngine;
use siteqms_events::EventBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: siteqms_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The single write path for NCR workflow state.
    pub engine: Arc<WorkflowEngine<PgNcrStore>>,
    /// Centralized event bus for publishing workflow events.
    pub event_bus: Arc<EventBus>,
}
