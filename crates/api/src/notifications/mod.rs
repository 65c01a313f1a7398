pub mod router;

pub use router::NcrNotificationRouter;
