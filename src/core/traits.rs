//! Core traits and types for publishing to Google Play
//!
//! This module defines the resources exchanged with the publishing API and
//! the narrow interface the publishing sequence is written against.

use crate::core::error::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::fs::File;

/// The only release track this tool publishes to
pub const ALPHA_TRACK: &str = "alpha";

// ============================================================================
// Edits
// ============================================================================

/// A draft changeset scoped to one package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppEdit {
    /// Opaque server-issued identifier
    #[serde(default)]
    pub id: String,

    /// Seconds since epoch at which the edit expires on the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_time_seconds: Option<String>,
}

impl fmt::Display for AppEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expiry_time_seconds {
            Some(expiry) => write!(f, "{{id: {}, expiryTimeSeconds: {}}}", self.id, expiry),
            None => write!(f, "{{id: {}}}", self.id),
        }
    }
}

// ============================================================================
// Bundles
// ============================================================================

/// Server acknowledgment of an uploaded bundle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Version code assigned to the uploaded artifact
    pub version_code: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

// ============================================================================
// Tracks
// ============================================================================

/// A release within a track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRelease {
    /// Version codes of the artifacts in this release
    #[serde(default, with = "int64_strings")]
    pub version_codes: Vec<i64>,
}

/// A named release channel and the releases it points at
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub track: String,

    #[serde(default)]
    pub releases: Vec<TrackRelease>,
}

impl Track {
    /// Track update pointing `name` at exactly one version code
    ///
    /// Sending this replaces the whole release list of the track within the
    /// edit.
    pub fn single_release(name: &str, version_code: i64) -> Self {
        Self {
            track: name.to_string(),
            releases: vec![TrackRelease {
                version_codes: vec![version_code],
            }],
        }
    }
}

/// Google APIs encode int64 values as JSON strings
mod int64_strings {
    use serde::de::{self, Deserializer};
    use serde::{Deserialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[i64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| v.to_string()))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Number(i64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<i64>, D::Error> {
        Vec::<Int64>::deserialize(deserializer)?
            .into_iter()
            .map(|value| match value {
                Int64::Number(n) => Ok(n),
                Int64::Text(s) => s.parse().map_err(de::Error::custom),
            })
            .collect()
    }
}

// ============================================================================
// Publishing API Trait
// ============================================================================

/// The remote operations the publishing sequence needs
///
/// Implemented by [`crate::client::GooglePlayClient`] for the real service
/// and by in-memory substitutes in tests.
#[async_trait]
pub trait PublishingApi: Send + Sync {
    /// Create a new edit for `package`
    async fn create_edit(&self, package: &str) -> Result<AppEdit, ApiError>;

    /// Upload `bundle` as the binary payload of the edit
    async fn upload_bundle(
        &self,
        package: &str,
        edit_id: &str,
        bundle: File,
    ) -> Result<Bundle, ApiError>;

    /// Replace the releases of `track.track` within the edit
    async fn update_track(
        &self,
        package: &str,
        edit_id: &str,
        track: Track,
    ) -> Result<Track, ApiError>;

    /// Commit the edit, publishing its changes
    async fn commit_edit(&self, package: &str, edit_id: &str) -> Result<AppEdit, ApiError>;

    /// Delete the edit, discarding its changes
    async fn delete_edit(&self, package: &str, edit_id: &str) -> Result<(), ApiError>;
}
