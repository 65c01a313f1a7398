//! SiteQMS workflow engine.
//!
//! Orchestrates NCR workflow transitions: load the record, evaluate the
//! transition guard, persist the resulting mutation through a conditional
//! write (with exactly one retry on a lost compare-and-swap race), and
//! publish a notification event. Storage is reached through the
//! [`NcrStore`] port so the engine is independent of the persistence
//! technology.

pub mod engine;
pub mod store;

pub use engine::WorkflowEngine;
pub use store::{NcrStore, StoreError};
