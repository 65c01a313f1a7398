//! Row models and DTOs.

pub mod ncr;
