pub mod health;
pub mod ncr;
