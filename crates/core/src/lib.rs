//! SiteQMS domain core.
//!
//! Pure domain logic for the non-conformance report (NCR) lifecycle:
//! shared types, the error taxonomy, role/capability resolution, the
//! severity classifier, the status transition table, and the transition
//! guard. This crate performs no I/O; persistence and transport live in
//! `siteqms-db` and `siteqms-api`.

pub mod error;
pub mod ncr;
pub mod ncr_status;
pub mod roles;
pub mod severity;
pub mod types;
pub mod workflow;
