//! Repository layer: one unit struct per table group, static async methods
//! taking the pool.

pub mod evidence_repo;
pub mod ncr_repo;

pub use evidence_repo::{NcrEvidenceRepo, NcrLotRepo};
pub use ncr_repo::NcrRepo;
