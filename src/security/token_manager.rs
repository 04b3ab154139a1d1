//! OAuth 2.0 access tokens for the publishing API
//!
//! A signed JWT assertion is exchanged at the service account's token
//! endpoint for a short-lived bearer token. The token is cached until shortly
//! before it expires.

use super::{AuthError, ServiceAccountKey};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// OAuth scope of the Google Play Developer API
pub const ANDROID_PUBLISHER_SCOPE: &str = "https://www.googleapis.com/auth/androidpublisher";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each assertion
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens are refreshed this long before they expire
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

/// Issues and caches access tokens for one service account
pub struct TokenManager {
    client_email: String,
    key_id: Option<String>,
    token_uri: String,
    encoding_key: EncodingKey,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    /// Create a manager from a parsed key
    ///
    /// Fails when the private key is not a valid RSA PEM.
    pub fn new(key: ServiceAccountKey, http: reqwest::Client) -> Result<Self, AuthError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
            .map_err(|e| AuthError::InvalidKey(e.to_string()))?;

        Ok(Self {
            client_email: key.client_email,
            key_id: key.private_key_id,
            token_uri: key.token_uri,
            encoding_key,
            http,
            cached: Mutex::new(None),
        })
    }

    /// Service account identity
    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Mint a signed assertion valid from `now`
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let header = Header {
            kid: self.key_id.clone(),
            alg: Algorithm::RS256,
            ..Default::default()
        };

        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: ANDROID_PUBLISHER_SCOPE.to_string(),
            aud: self.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidKey(e.to_string()))
    }

    /// Return a valid access token, fetching a new one when needed
    pub async fn access_token(&self) -> Result<SecretString, AuthError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Utc::now() < token.expires_at {
                return Ok(SecretString::new(token.token.expose_secret().into()));
            }
            log::debug!("access token expired, refreshing");
        }

        let fresh = self.fetch_token().await?;
        let token = SecretString::new(fresh.token.expose_secret().into());
        cached.replace(fresh);

        Ok(token)
    }

    async fn fetch_token(&self) -> Result<CachedToken, AuthError> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;

        log::debug!("POST {} ({})", self.token_uri, self.client_email);

        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => AuthError::Rejected {
                    status: status.as_u16(),
                    error: err.error,
                    description: err.error_description,
                },
                Err(_) => AuthError::Rejected {
                    status: status.as_u16(),
                    error: body,
                    description: None,
                },
            });
        }

        let response: TokenResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::Request(e.to_string()))?;
        let lifetime = response.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);

        log::debug!(
            "obtained access token {} valid for {}s",
            mask_token(&response.access_token),
            lifetime
        );

        Ok(CachedToken {
            token: SecretString::new(response.access_token.into()),
            expires_at: now + Duration::seconds(lifetime - EXPIRY_MARGIN_SECS),
        })
    }
}

/// Masks a token for safe logging
///
/// Shows only the first 3 and last 3 characters for identification purposes.
/// Tokens shorter than 10 characters are fully masked as "****".
///
/// # Examples
///
/// ```
/// use play_publisher::security::mask_token;
///
/// assert_eq!(mask_token("ya29.abcdef123456"), "ya2...456");
/// assert_eq!(mask_token("short"), "****");
/// ```
pub fn mask_token(token: &str) -> String {
    if token.len() < 10 || !token.is_ascii() {
        return "****".to_string();
    }

    let prefix = &token[..3];
    let suffix = &token[token.len() - 3..];
    format!("{}...{}", prefix, suffix)
}
