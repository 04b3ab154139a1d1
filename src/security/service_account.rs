//! Service account credentials
//!
//! The credentials file is the JSON key downloaded from the Google Cloud
//! console. Only the fields needed to mint token assertions are kept; the
//! private key never leaves a [`SecretString`].

use super::AuthError;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// Default OAuth 2.0 token endpoint
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const SERVICE_ACCOUNT_TYPE: &str = "service_account";

#[derive(Deserialize)]
struct RawServiceAccountKey {
    #[serde(rename = "type")]
    key_type: String,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    private_key_id: Option<String>,
    private_key: String,
    client_email: String,
    #[serde(default)]
    token_uri: Option<String>,
}

/// A parsed service account key
#[derive(Debug)]
pub struct ServiceAccountKey {
    /// Google Cloud project owning the account
    pub project_id: Option<String>,

    /// Identifier of the key, sent as the JWT `kid`
    pub private_key_id: Option<String>,

    /// PEM encoded RSA private key
    pub private_key: SecretString,

    /// Service account identity, e.g. `publisher@project.iam.gserviceaccount.com`
    pub client_email: String,

    /// Endpoint the signed assertion is exchanged at
    pub token_uri: String,
}

impl ServiceAccountKey {
    /// Construct an instance from serialized JSON.
    pub fn from_json(data: impl AsRef<[u8]>) -> Result<Self, AuthError> {
        let raw: RawServiceAccountKey =
            serde_json::from_slice(data.as_ref()).map_err(|e| AuthError::Parse(e.to_string()))?;

        if raw.key_type != SERVICE_ACCOUNT_TYPE {
            return Err(AuthError::UnsupportedType(raw.key_type));
        }

        Ok(Self {
            project_id: raw.project_id,
            private_key_id: raw.private_key_id,
            private_key: SecretString::new(raw.private_key.into()),
            client_email: raw.client_email,
            token_uri: raw
                .token_uri
                .filter(|uri| !uri.is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
        })
    }

    /// Construct an instance from a JSON file.
    pub async fn from_json_path(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let data = fs::read(path).await.map_err(|source| AuthError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(data)
    }
}
