pub mod client;
pub mod core;
pub mod orchestration;
pub mod security;

pub use client::GooglePlayClient;
pub use crate::core::*;
pub use orchestration::{EditPublisher, PublishOutcome, open_bundle};
pub use security::{AuthError, ServiceAccountKey, TokenManager};
