//! Orchestration of a single publishing run

pub mod bundle;
pub mod publisher;

pub use bundle::open_bundle;
pub use publisher::{EditPublisher, PublishOutcome};
