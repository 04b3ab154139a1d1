//! Google Play Developer API client
//!
//! Implements [`PublishingApi`] against the androidpublisher v3 REST
//! endpoints. Requests are authenticated with a bearer token from the
//! service account's [`TokenManager`].

use crate::core::error::ApiError;
use crate::core::traits::{AppEdit, Bundle, PublishingApi, Track};
use crate::security::{AuthError, ServiceAccountKey, TokenManager};
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs::File;

/// Production API root
pub const DEFAULT_BASE_URL: &str = "https://androidpublisher.googleapis.com";

const USER_AGENT: &str = concat!("play-publisher/", env!("CARGO_PKG_VERSION"));

/// A client for the Google Play Developer API.
pub struct GooglePlayClient {
    http: Client,
    tokens: TokenManager,
    base_url: String,
}

impl GooglePlayClient {
    /// Authenticate with the service account key at `path`
    ///
    /// The key is parsed and a first access token is obtained before
    /// returning, so every authentication problem surfaces here.
    pub async fn authenticate(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let key = ServiceAccountKey::from_json_path(path).await?;

        let http = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AuthError::Request(e.to_string()))?;
        let tokens = TokenManager::new(key, http.clone())?;

        tokens.access_token().await?;
        log::info!("authenticated as {}", tokens.client_email());

        Ok(Self::new(http, tokens))
    }

    /// Create a client from an existing HTTP client and token manager.
    pub fn new(http: Client, tokens: TokenManager) -> Self {
        Self {
            http,
            tokens,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn edits_url(&self, package: &str) -> String {
        format!(
            "{}/androidpublisher/v3/applications/{}/edits",
            self.base_url, package
        )
    }

    fn edit_url(&self, package: &str, edit_id: &str) -> String {
        format!("{}/{}", self.edits_url(package), edit_id)
    }

    fn upload_url(&self, package: &str, edit_id: &str) -> String {
        format!(
            "{}/upload/androidpublisher/v3/applications/{}/edits/{}/bundles?uploadType=media",
            self.base_url, package, edit_id
        )
    }

    fn track_url(&self, package: &str, edit_id: &str, track: &str) -> String {
        format!("{}/tracks/{}", self.edit_url(package, edit_id), track)
    }

    fn commit_url(&self, package: &str, edit_id: &str) -> String {
        format!("{}:commit", self.edit_url(package, edit_id))
    }

    /// Authorize and send a request, converting error statuses to [`ApiError`]
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let token = self.tokens.access_token().await?;
        let request = request.bearer_auth(token.expose_secret()).build()?;
        let method = request.method().to_string();
        let url = request.url().to_string();

        log::debug!("{} {}", method, url);

        let response = self.http.execute(request).await?;
        let status = response.status();

        log::debug!("{} {} -> {}", method, url, status);

        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await?;
            Err(ApiError::from_response(status.as_u16(), &body))
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl PublishingApi for GooglePlayClient {
    async fn create_edit(&self, package: &str) -> Result<AppEdit, ApiError> {
        let request = self
            .http
            .post(self.edits_url(package))
            .json(&serde_json::json!({}));

        self.send_json(request).await
    }

    async fn upload_bundle(
        &self,
        package: &str,
        edit_id: &str,
        bundle: File,
    ) -> Result<Bundle, ApiError> {
        let mut request = self
            .http
            .post(self.upload_url(package, edit_id))
            .header(CONTENT_TYPE, "application/octet-stream");

        if let Ok(metadata) = bundle.metadata().await {
            log::info!("uploading bundle ({} bytes)", metadata.len());
            request = request.header(CONTENT_LENGTH, metadata.len());
        }

        self.send_json(request.body(bundle)).await
    }

    async fn update_track(
        &self,
        package: &str,
        edit_id: &str,
        track: Track,
    ) -> Result<Track, ApiError> {
        let request = self
            .http
            .put(self.track_url(package, edit_id, &track.track))
            .json(&track);

        self.send_json(request).await
    }

    async fn commit_edit(&self, package: &str, edit_id: &str) -> Result<AppEdit, ApiError> {
        // The front end requires a length on bodyless POSTs.
        let request = self
            .http
            .post(self.commit_url(package, edit_id))
            .header(CONTENT_LENGTH, 0);

        self.send_json(request).await
    }

    async fn delete_edit(&self, package: &str, edit_id: &str) -> Result<(), ApiError> {
        let request = self.http.delete(self.edit_url(package, edit_id));

        self.send(request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PublisherConfig;
    use crate::core::error::PublishError;
    use crate::orchestration::{EditPublisher, PublishOutcome};
    use secrecy::SecretString;
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::NamedTempFile;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/service_account_key.pem");

    fn client() -> GooglePlayClient {
        let key = ServiceAccountKey {
            project_id: None,
            private_key_id: None,
            private_key: SecretString::new(PRIVATE_KEY.into()),
            client_email: "publisher@demo.iam.gserviceaccount.com".to_string(),
            token_uri: "http://127.0.0.1:9/token".to_string(),
        };
        let http = Client::new();
        let tokens = TokenManager::new(key, http.clone()).unwrap();
        GooglePlayClient::new(http, tokens)
    }

    #[test]
    fn test_default_base_url() {
        assert_eq!(client().base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_with_base_url_strips_trailing_slash() {
        let client = client().with_base_url("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_edit_urls() {
        let client = client();

        assert_eq!(
            client.edits_url("com.example.app"),
            "https://androidpublisher.googleapis.com/androidpublisher/v3/applications/com.example.app/edits"
        );
        assert_eq!(
            client.commit_url("com.example.app", "e1"),
            "https://androidpublisher.googleapis.com/androidpublisher/v3/applications/com.example.app/edits/e1:commit"
        );
        assert_eq!(
            client.track_url("com.example.app", "e1", "alpha"),
            "https://androidpublisher.googleapis.com/androidpublisher/v3/applications/com.example.app/edits/e1/tracks/alpha"
        );
    }

    #[test]
    fn test_upload_url_uses_media_upload() {
        let client = client();

        assert_eq!(
            client.upload_url("com.example.app", "e1"),
            "https://androidpublisher.googleapis.com/upload/androidpublisher/v3/applications/com.example.app/edits/e1/bundles?uploadType=media"
        );
    }

    #[tokio::test]
    async fn test_token_failure_surfaces_as_unauthenticated() {
        let error = client().create_edit("com.example.app").await.unwrap_err();

        assert!(matches!(error, ApiError::Unauthenticated(_)));
    }

    /// One request as seen by [`MockServer`]
    #[derive(Debug, Clone)]
    struct Recorded {
        method: String,
        path: String,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    }

    impl Recorded {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers.get(name).map(String::as_str)
        }

        fn json(&self) -> serde_json::Value {
            serde_json::from_slice(&self.body).unwrap()
        }
    }

    /// Minimal HTTP/1.1 server answering canned responses by method and path
    struct MockServer {
        base_url: String,
        requests: Arc<Mutex<Vec<Recorded>>>,
    }

    impl MockServer {
        async fn start(routes: Vec<(&'static str, &'static str, u16, &'static str)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));
            let routes = Arc::new(routes);

            let recorded = requests.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        return;
                    };
                    let recorded = recorded.clone();
                    let routes = routes.clone();
                    tokio::spawn(async move {
                        Self::serve(stream, &routes, &recorded).await;
                    });
                }
            });

            Self { base_url, requests }
        }

        async fn serve(
            stream: TcpStream,
            routes: &[(&'static str, &'static str, u16, &'static str)],
            recorded: &Mutex<Vec<Recorded>>,
        ) {
            let mut reader = BufReader::new(stream);

            let mut request_line = String::new();
            if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
                return;
            }
            let mut parts = request_line.split_whitespace();
            let method = parts.next().unwrap_or_default().to_string();
            let path = parts.next().unwrap_or_default().to_string();

            let mut headers = HashMap::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
                }
            }

            let length = headers
                .get("content-length")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0);
            let mut body = vec![0; length];
            reader.read_exact(&mut body).await.unwrap();

            let route_path = path.split('?').next().unwrap_or_default();
            let (status, response) = routes
                .iter()
                .find(|(m, p, _, _)| *m == method && *p == route_path)
                .map(|(_, _, status, body)| (*status, *body))
                .unwrap_or((404, r#"{"error":{"code":404,"message":"no route"}}"#));

            recorded.lock().unwrap().push(Recorded {
                method,
                path,
                headers,
                body,
            });

            let reply = format!(
                "HTTP/1.1 {status} Mock\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{response}",
                response.len()
            );
            let mut stream = reader.into_inner();
            stream.write_all(reply.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        }

        fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }

        fn client(&self) -> GooglePlayClient {
            let key = ServiceAccountKey {
                project_id: None,
                private_key_id: Some("key-1".to_string()),
                private_key: SecretString::new(PRIVATE_KEY.into()),
                client_email: "publisher@demo.iam.gserviceaccount.com".to_string(),
                token_uri: format!("{}/token", self.base_url),
            };
            let http = Client::builder().no_proxy().build().unwrap();
            let tokens = TokenManager::new(key, http.clone()).unwrap();
            GooglePlayClient::new(http, tokens).with_base_url(&self.base_url)
        }
    }

    const EDITS: &str = "/androidpublisher/v3/applications/com.example.app/edits";
    const TOKEN: &str = r#"{"access_token":"ya29.test-access-token","expires_in":3599,"token_type":"Bearer"}"#;

    fn routes(commit_status: u16) -> Vec<(&'static str, &'static str, u16, &'static str)> {
        vec![
            ("POST", "/token", 200, TOKEN),
            ("POST", EDITS, 200, r#"{"id":"e1","expiryTimeSeconds":"1700000000"}"#),
            (
                "POST",
                "/upload/androidpublisher/v3/applications/com.example.app/edits/e1/bundles",
                200,
                r#"{"versionCode":311,"sha1":"aa","sha256":"bb"}"#,
            ),
            (
                "PUT",
                "/androidpublisher/v3/applications/com.example.app/edits/e1/tracks/alpha",
                200,
                r#"{"track":"alpha","releases":[{"versionCodes":["311"]}]}"#,
            ),
            (
                "POST",
                "/androidpublisher/v3/applications/com.example.app/edits/e1:commit",
                commit_status,
                r#"{"id":"e1"}"#,
            ),
            (
                "DELETE",
                "/androidpublisher/v3/applications/com.example.app/edits/e1",
                204,
                "",
            ),
        ]
    }

    fn config(commit: bool) -> PublisherConfig {
        PublisherConfig {
            credentials_path: PathBuf::from("/tmp/key.json"),
            package_name: "com.example.app".to_string(),
            bundle_path: PathBuf::from("/tmp/app.aab"),
            commit,
        }
    }

    async fn bundle_file() -> (NamedTempFile, File) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"bundle-data").unwrap();
        let handle = File::open(file.path()).await.unwrap();
        (file, handle)
    }

    #[tokio::test]
    async fn test_commit_sequence_over_http() {
        let server = MockServer::start(routes(200)).await;
        let client = server.client();
        let (_file, bundle) = bundle_file().await;

        let outcome = EditPublisher::new(&client)
            .publish(&config(true), bundle)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PublishOutcome::Committed(AppEdit {
                id: "e1".to_string(),
                expiry_time_seconds: None,
            })
        );

        let requests = server.requests();
        assert_eq!(requests.len(), 5);

        let token = &requests[0];
        assert_eq!((token.method.as_str(), token.path.as_str()), ("POST", "/token"));
        let form = String::from_utf8(token.body.clone()).unwrap();
        assert!(form.contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"));
        assert!(form.contains("assertion="));

        for request in &requests[1..] {
            assert_eq!(
                request.header("authorization"),
                Some("Bearer ya29.test-access-token")
            );
        }

        let create = &requests[1];
        assert_eq!(create.method, "POST");
        assert_eq!(create.path, EDITS);
        assert_eq!(create.json(), serde_json::json!({}));

        let upload = &requests[2];
        assert_eq!(upload.method, "POST");
        assert_eq!(
            upload.path,
            "/upload/androidpublisher/v3/applications/com.example.app/edits/e1/bundles?uploadType=media"
        );
        assert_eq!(upload.header("content-type"), Some("application/octet-stream"));
        assert_eq!(upload.header("content-length"), Some("11"));
        assert_eq!(upload.body, b"bundle-data");

        let track = &requests[3];
        assert_eq!(track.method, "PUT");
        assert!(track.path.ends_with("/edits/e1/tracks/alpha"));
        assert_eq!(
            track.json(),
            serde_json::json!({"track": "alpha", "releases": [{"versionCodes": ["311"]}]})
        );

        let commit = &requests[4];
        assert_eq!(commit.method, "POST");
        assert!(commit.path.ends_with("/edits/e1:commit"));
        assert_eq!(commit.header("content-length"), Some("0"));
        assert!(commit.body.is_empty());
    }

    #[tokio::test]
    async fn test_abort_sequence_deletes_over_http() {
        let server = MockServer::start(routes(200)).await;
        let client = server.client();
        let (_file, bundle) = bundle_file().await;

        let outcome = EditPublisher::new(&client)
            .publish(&config(false), bundle)
            .await
            .unwrap();

        assert_eq!(outcome, PublishOutcome::Aborted(None));

        let requests = server.requests();
        let delete = requests.last().unwrap();
        assert_eq!(delete.method, "DELETE");
        assert_eq!(delete.path, format!("{EDITS}/e1"));
        assert_eq!(
            delete.header("authorization"),
            Some("Bearer ya29.test-access-token")
        );
        assert!(!requests.iter().any(|r| r.path.ends_with(":commit")));
    }

    #[tokio::test]
    async fn test_error_response_is_decoded() {
        let server = MockServer::start(vec![
            ("POST", "/token", 200, TOKEN),
            (
                "POST",
                EDITS,
                403,
                r#"{"error":{"code":403,"message":"The caller does not have permission","errors":[{"reason":"forbidden"}]}}"#,
            ),
        ])
        .await;
        let client = server.client();
        let (_file, bundle) = bundle_file().await;

        let error = EditPublisher::new(&client)
            .publish(&config(true), bundle)
            .await
            .unwrap_err();

        assert_eq!(
            error.to_string(),
            "error creating edit, googleapi: Error 403: The caller does not have permission, forbidden"
        );
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_commit_failure_over_http() {
        let server = MockServer::start(routes(500)).await;
        let client = server.client();
        let (_file, bundle) = bundle_file().await;

        let error = EditPublisher::new(&client)
            .publish(&config(true), bundle)
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            PublishError::Commit(ApiError::UnexpectedResponse { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_token_is_fetched_once() {
        let server = MockServer::start(routes(200)).await;
        let client = server.client();
        let (_file, bundle) = bundle_file().await;

        EditPublisher::new(&client)
            .publish(&config(false), bundle)
            .await
            .unwrap();

        let token_requests = server
            .requests()
            .iter()
            .filter(|r| r.path == "/token")
            .count();
        assert_eq!(token_requests, 1);
    }

    #[tokio::test]
    async fn test_authenticate_with_missing_credentials() {
        let result = GooglePlayClient::authenticate("/nonexistent/credentials.json").await;

        assert!(matches!(result, Err(AuthError::Read { .. })));
    }
}
