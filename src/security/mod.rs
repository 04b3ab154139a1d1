pub mod service_account;
pub mod token_manager;

pub use service_account::ServiceAccountKey;
pub use token_manager::{TokenManager, mask_token};

use std::path::PathBuf;
use thiserror::Error;

/// Failure to authenticate with the publishing API
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("error reading credentials {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid credentials file: {0}")]
    Parse(String),

    #[error("unsupported credentials type {0:?}, expected \"service_account\"")]
    UnsupportedType(String),

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("token request failed: {0}")]
    Request(String),

    #[error("token endpoint returned {status}: {error}{}", description_suffix(.description))]
    Rejected {
        status: u16,
        error: String,
        description: Option<String>,
    },
}

fn description_suffix(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}
