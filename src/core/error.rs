//! Error handling for the publishing sequence
//!
//! Every step of the sequence has a dedicated variant so the binary can
//! report a step-specific prefix. Remote failures are carried as
//! [`ApiError`] values.

use crate::core::state_machine::InvalidTransition;
use crate::security::AuthError;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by the publishing API or the transport beneath it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("googleapi: Error {code}: {message}{}", reason_suffix(.reason))]
    Service {
        code: u16,
        message: String,
        reason: Option<String>,
    },

    #[error("googleapi: got HTTP response code {status} with body: {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("authentication failed: {0}")]
    Unauthenticated(String),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason.as_deref().map(|r| format!(", {r}")).unwrap_or_default()
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Deserialize)]
struct ErrorItem {
    #[serde(default)]
    reason: String,
}

impl ApiError {
    /// Build an error from a non-success HTTP response body
    ///
    /// Bodies in the Google error envelope become [`ApiError::Service`];
    /// anything else is kept verbatim.
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(ErrorEnvelope { error }) if !error.message.is_empty() || !error.errors.is_empty() => {
                Self::Service {
                    code: if error.code == 0 { status } else { error.code },
                    message: error.message,
                    reason: error
                        .errors
                        .into_iter()
                        .map(|e| e.reason)
                        .find(|r| !r.is_empty()),
                }
            }
            _ => Self::UnexpectedResponse {
                status,
                body: body.to_string(),
            },
        }
    }

    /// HTTP status when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { code, .. } => Some(*code),
            Self::UnexpectedResponse { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        Self::Unauthenticated(error.to_string())
    }
}

/// Main error type for a publishing run
///
/// Each variant is fatal and maps to exit status 1.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("error opening {path:?}: {source}")]
    BundleOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Authentication(#[from] AuthError),

    #[error("error creating edit, {0}")]
    CreateEdit(#[source] ApiError),

    #[error("error uploading package, {0}")]
    Upload(#[source] ApiError),

    #[error("error updating tracks, {0}")]
    UpdateTrack(#[source] ApiError),

    #[error("error commiting edit, {0}")]
    Commit(#[source] ApiError),

    #[error("{0}")]
    State(#[from] InvalidTransition),
}

impl PublishError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Whether the error left an unfinished edit on the server
    pub fn leaves_orphaned_edit(&self) -> bool {
        matches!(
            self,
            Self::Upload(_) | Self::UpdateTrack(_) | Self::Commit(_)
        )
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::BundleOpen { .. } => vec![
                "Check that GOOGLE_PLAY_PACKAGE_PATH points at an existing bundle",
                "Check the file permissions",
            ],
            Self::Authentication(_) => vec![
                "Check that GOOGLE_PLAY_CREDENTIALS_PATH points at a service account key",
                "Check that the service account has access to the Play Console",
            ],
            Self::CreateEdit(_) => vec![
                "Check GOOGLE_PLAY_PACKAGE_NAME",
                "Check that the app exists in the Play Console",
            ],
            Self::Upload(_) => vec![
                "Check that the version code has not been used before",
                "Check that the bundle is signed with the upload key",
            ],
            Self::UpdateTrack(_) | Self::Commit(_) => {
                vec!["Check the release state of the track in the Play Console"]
            }
            Self::State(_) => vec![],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::BundleOpen { .. } => "BUNDLE_OPEN_FAILED",
            Self::Authentication(_) => "AUTHENTICATION_FAILED",
            Self::CreateEdit(_) => "CREATE_EDIT_FAILED",
            Self::Upload(_) => "UPLOAD_FAILED",
            Self::UpdateTrack(_) => "UPDATE_TRACK_FAILED",
            Self::Commit(_) => "COMMIT_FAILED",
            Self::State(_) => "INVALID_STATE",
        }
    }
}
