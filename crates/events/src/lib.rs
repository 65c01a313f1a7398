//! SiteQMS event bus and notification delivery.
//!
//! Building blocks for the NCR workflow's fire-and-forget side effects:
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`. Publishing never blocks and never fails the
//!   publisher.
//! - [`NcrEvent`] -- the canonical workflow event envelope.
//! - [`email`] -- best-effort SMTP delivery via `lettre`.

pub mod bus;
pub mod email;

pub use bus::{EventBus, NcrEvent};
pub use email::{EmailConfig, EmailDelivery};
