//! Authenticated requests.
//!
//! [`AuthClient::send`] attaches the bearer token, and on a first-attempt 401
//! runs one refresh cycle before reissuing the identical request. The second
//! attempt's response is returned whatever its status, so a request is sent
//! at most twice.

use std::sync::Arc;

use bytes::Bytes;
use ecovision_settings::{AuthSettings, EcoVisionSettings};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::decoder::ResponseDecoder;
use crate::errors::AuthError;
use crate::inspector::TokenInspector;
use crate::refresher::TokenRefresher;
use crate::store::CredentialStore;

const APPLICATION_JSON: &str = "application/json";

// ─────────────────────────────────────────────────────────────────────────────
// Request description
// ─────────────────────────────────────────────────────────────────────────────

/// Request body. Kept as owned data so the request can be rebuilt for a retry.
#[derive(Clone, Debug, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// JSON document.
    Json(Value),
    /// Pre-serialized text.
    Text(String),
    /// `multipart/form-data`; the transport picks the boundary.
    Multipart(MultipartBody),
}

/// Owned multipart form.
#[derive(Clone, Debug, Default)]
pub struct MultipartBody {
    parts: Vec<MultipartPart>,
}

#[derive(Clone, Debug)]
enum MultipartPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: String,
        bytes: Bytes,
    },
}

impl MultipartBody {
    /// Empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field.
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(MultipartPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Add a file field.
    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(MultipartPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        });
        self
    }

    fn to_form(&self) -> Result<reqwest::multipart::Form, AuthError> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            form = match part {
                MultipartPart::Text { name, value } => form.text(name.clone(), value.clone()),
                MultipartPart::File {
                    name,
                    file_name,
                    mime,
                    bytes,
                } => {
                    let file = reqwest::multipart::Part::bytes(bytes.to_vec())
                        .file_name(file_name.clone())
                        .mime_str(mime)?;
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

/// One outbound call: method, resource, caller headers and body.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    method: Method,
    resource: String,
    headers: HeaderMap,
    body: RequestBody,
}

impl ApiRequest {
    /// Request for `resource`, either a path under the base URL or an absolute URL.
    pub fn new(method: Method, resource: impl Into<String>) -> Self {
        Self {
            method,
            resource: resource.into(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// GET request.
    pub fn get(resource: impl Into<String>) -> Self {
        Self::new(Method::GET, resource)
    }

    /// POST request.
    pub fn post(resource: impl Into<String>) -> Self {
        Self::new(Method::POST, resource)
    }

    /// Add a caller header.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        let _ = self.headers.insert(name, value);
        self
    }

    /// JSON body.
    #[must_use]
    pub fn json(mut self, value: Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    /// Text body.
    #[must_use]
    pub fn text(mut self, value: impl Into<String>) -> Self {
        self.body = RequestBody::Text(value.into());
        self
    }

    /// Multipart body.
    #[must_use]
    pub fn multipart(mut self, form: MultipartBody) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Resource path or URL.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Headers for one attempt: caller headers, bearer token, content negotiation.
    fn attempt_headers(&self, token: Option<&str>) -> Result<HeaderMap, AuthError> {
        let mut headers = self.headers.clone();

        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                AuthError::InvalidCredentials("access token is not a valid header value".into())
            })?;
            let _ = headers.insert(AUTHORIZATION, value);
        }

        if !headers.contains_key(ACCEPT) {
            let _ = headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
        }

        match self.body {
            RequestBody::Multipart(_) => {
                let _ = headers.remove(CONTENT_TYPE);
            }
            RequestBody::Empty => {}
            RequestBody::Json(_) | RequestBody::Text(_) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
                }
            }
        }

        Ok(headers)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Which attempt of a request is being sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Attempt {
    First,
    Retry,
}

/// Endpoint paths used by the session calls.
#[derive(Clone, Debug)]
pub(crate) struct Endpoints {
    pub(crate) login: String,
    pub(crate) register: String,
    pub(crate) health: String,
}

/// HTTP client for the EcoVision backend with token handling.
#[derive(Clone, Debug)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<CredentialStore>,
    refresher: TokenRefresher,
    inspector: TokenInspector,
    pub(crate) endpoints: Endpoints,
}

impl AuthClient {
    /// Client with default paths and timeouts.
    pub fn new(base_url: impl Into<String>, store: Arc<CredentialStore>) -> Self {
        let settings = EcoVisionSettings::default();
        Self::with_http(
            reqwest::Client::new(),
            base_url,
            &settings.auth,
            &settings.api.health_path,
            store,
        )
    }

    /// Client configured from settings, with a request timeout applied.
    pub fn from_settings(
        settings: &EcoVisionSettings,
        store: Arc<CredentialStore>,
    ) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(settings.api.request_timeout())
            .build()?;
        Ok(Self::with_http(
            http,
            settings.api.normalized_base_url(),
            &settings.auth,
            &settings.api.health_path,
            store,
        ))
    }

    /// Client over an existing HTTP client.
    pub fn with_http(
        http: reqwest::Client,
        base_url: impl Into<String>,
        auth: &AuthSettings,
        health_path: &str,
        store: Arc<CredentialStore>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let refresher = TokenRefresher::new(
            http.clone(),
            join_url(&base_url, &auth.refresh_path),
            Arc::clone(&store),
            auth.refresh_timeout(),
        );
        Self {
            http,
            store,
            refresher,
            inspector: TokenInspector::new(auth.expiry_horizon_secs),
            endpoints: Endpoints {
                login: auth.login_path.clone(),
                register: auth.register_path.clone(),
                health: health_path.to_string(),
            },
            base_url,
        }
    }

    /// Credential store shared with the refresher.
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Token refresher; register the session-expired listener here.
    pub fn refresher(&self) -> &TokenRefresher {
        &self.refresher
    }

    /// Expiry inspector.
    pub fn inspector(&self) -> &TokenInspector {
        &self.inspector
    }

    /// Underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Backend origin.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a resource.
    pub fn url_for(&self, resource: &str) -> String {
        join_url(&self.base_url, resource)
    }

    /// Send with the stored token, refreshing once on a first-attempt 401.
    ///
    /// Returns every response except a first-attempt 401. A 401 whose refresh
    /// fails surfaces as [`AuthError::SessionExpired`].
    #[tracing::instrument(skip_all, fields(method = %request.method, resource = %request.resource))]
    pub async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response, AuthError> {
        let mut attempt = Attempt::First;
        let mut token = self.bearer_token();

        loop {
            let response = self.dispatch(request, token.as_deref()).await?;
            let status = response.status();
            debug!(status = status.as_u16(), ?attempt, "response received");

            if status != StatusCode::UNAUTHORIZED || attempt == Attempt::Retry {
                return Ok(response);
            }

            token = match self.bearer_token() {
                Some(current) if token.as_deref() != Some(current.as_str()) => {
                    debug!("access token changed while in flight, retrying without refresh");
                    Some(current)
                }
                _ => {
                    debug!("received 401, refreshing access token");
                    let fresh = self
                        .refresher
                        .refresh()
                        .await
                        .map_err(AuthError::SessionExpired)?;
                    Some(fresh)
                }
            };
            attempt = Attempt::Retry;
        }
    }

    /// Access token to send. A lone access token without its refresh token is
    /// a partial session and is not sent.
    fn bearer_token(&self) -> Option<String> {
        self.store.get().map(|creds| creds.access_token)
    }

    /// Send and decode. `Ok(None)` for 204.
    pub async fn send_decoded(&self, request: &ApiRequest) -> Result<Option<Value>, AuthError> {
        let response = self.send(request).await?;
        ResponseDecoder::new().decode(response).await
    }

    /// Send and deserialize a JSON payload into `T`.
    pub async fn fetch<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, AuthError> {
        let value = self.send_decoded(request).await?.ok_or_else(|| {
            AuthError::Decode(format!("empty response from {}", request.resource))
        })?;
        serde_json::from_value(value)
            .map_err(|e| AuthError::Decode(format!("unexpected payload from {}: {e}", request.resource)))
    }

    /// GET a resource and deserialize it.
    pub async fn get<T: DeserializeOwned>(&self, resource: &str) -> Result<T, AuthError> {
        self.fetch(&ApiRequest::get(resource)).await
    }

    /// POST a JSON body and deserialize the reply.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        body: Value,
    ) -> Result<T, AuthError> {
        self.fetch(&ApiRequest::post(resource).json(body)).await
    }

    /// POST a multipart form and deserialize the reply.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        resource: &str,
        form: MultipartBody,
    ) -> Result<T, AuthError> {
        self.fetch(&ApiRequest::post(resource).multipart(form)).await
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response, AuthError> {
        let headers = request.attempt_headers(token)?;
        let mut builder = self
            .http
            .request(request.method.clone(), self.url_for(&request.resource))
            .headers(headers);

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(serde_json::to_vec(value)?),
            RequestBody::Text(text) => builder.body(text.clone()),
            RequestBody::Multipart(form) => builder.multipart(form.to_form()?),
        };

        Ok(builder.send().await?)
    }
}

/// Join a resource onto the base URL; absolute URLs pass through.
fn join_url(base_url: &str, resource: &str) -> String {
    if resource.starts_with("http://") || resource.starts_with("https://") {
        return resource.to_string();
    }
    if resource.starts_with('/') {
        format!("{base_url}{resource}")
    } else {
        format!("{base_url}/{resource}")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::errors::RefreshError;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{header, header_regex, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn store_with(access: &str, refresh: &str) -> Arc<CredentialStore> {
        let store = Arc::new(CredentialStore::in_memory());
        store.set(access, refresh, None).unwrap();
        store
    }

    async fn mount_refresh(server: &MockServer, access: &str, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access": access}))
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[test]
    fn join_url_variants() {
        assert_eq!(join_url("http://h", "/a/"), "http://h/a/");
        assert_eq!(join_url("http://h", "a"), "http://h/a");
        assert_eq!(join_url("http://h", "https://x/y"), "https://x/y");
    }

    #[test]
    fn json_body_gets_json_content_type() {
        let req = ApiRequest::post("/waste-banks").json(json!({"name": "x"}));
        let headers = req.attempt_headers(Some("T1")).unwrap();
        assert_eq!(headers[CONTENT_TYPE], APPLICATION_JSON);
        assert_eq!(headers[ACCEPT], APPLICATION_JSON);
        assert_eq!(headers[AUTHORIZATION], "Bearer T1");
    }

    #[test]
    fn caller_headers_are_kept() {
        let req = ApiRequest::post("/x")
            .header(ACCEPT, HeaderValue::from_static("text/csv"))
            .header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .text("hello");
        let headers = req.attempt_headers(None).unwrap();
        assert_eq!(headers[ACCEPT], "text/csv");
        assert_eq!(headers[CONTENT_TYPE], "text/plain");
        assert!(!headers.contains_key(AUTHORIZATION));
    }

    #[test]
    fn multipart_drops_content_type_but_sets_accept() {
        let req = ApiRequest::post("/predict/")
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .multipart(MultipartBody::new().file("image", "a.png", "image/png", vec![1u8, 2, 3]));
        let headers = req.attempt_headers(Some("T1")).unwrap();
        assert!(!headers.contains_key(CONTENT_TYPE));
        assert_eq!(headers[ACCEPT], APPLICATION_JSON);
    }

    #[test]
    fn empty_body_has_no_content_type() {
        let headers = ApiRequest::get("/x").attempt_headers(None).unwrap();
        assert!(!headers.contains_key(CONTENT_TYPE));
    }

    #[tokio::test]
    async fn attaches_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/leaderboard/"))
            .and(header("authorization", "Bearer T1"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri(), store_with("T1", "R1"));
        let rows: Vec<Value> = client.get("/leaderboard/").await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn no_token_means_no_authorization_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(|req: &Request| !req.headers.contains_key("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri(), Arc::new(CredentialStore::in_memory()));
        let body: Value = client.get("/health-check").await.unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn partial_session_sends_no_authorization_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(|req: &Request| !req.headers.contains_key("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(CredentialStore::in_memory());
        store.set_access_only("T1").unwrap();
        let client = AuthClient::new(server.uri(), store);
        let body: Value = client.get("/leaderboard/").await.unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn refreshes_once_and_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/leaderboard/"))
            .and(header("authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/leaderboard/"))
            .and(header("authorization", "Bearer T2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server, "T2", 1).await;

        let store = store_with("T1", "R1");
        let client = AuthClient::new(server.uri(), Arc::clone(&store));

        let body: Value = client.get("/leaderboard/").await.unwrap();
        assert_eq!(body, json!({"data": []}));
        assert_eq!(store.access_token().as_deref(), Some("T2"));
        assert_eq!(store.refresh_token().as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn concurrent_401s_share_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer T2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(3)
            .mount(&server)
            .await;
        mount_refresh(&server, "T2", 1).await;

        let store = store_with("T1", "R1");
        let client = AuthClient::new(server.uri(), Arc::clone(&store));

        let (a, b, c) = tokio::join!(
            client.get::<Value>("/leaderboard/"),
            client.get::<Value>("/waste-banks"),
            client.get::<Value>("/trash-cans"),
        );
        for result in [a, b, c] {
            assert_eq!(result.unwrap()["ok"], true);
        }
        assert_eq!(store.access_token().as_deref(), Some("T2"));
    }

    #[tokio::test]
    async fn late_401_retries_with_token_refreshed_meanwhile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/leaderboard/"))
            .and(header("authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/waste-banks"))
            .and(header("authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(400)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer T2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(2)
            .mount(&server)
            .await;
        mount_refresh(&server, "T2", 1).await;

        let store = store_with("T1", "R1");
        let client = AuthClient::new(server.uri(), Arc::clone(&store));

        // The waste-banks 401 arrives after the leaderboard refresh stored T2.
        let (a, b) = tokio::join!(
            client.get::<Value>("/leaderboard/"),
            client.get::<Value>("/waste-banks"),
        );
        assert_eq!(a.unwrap()["ok"], true);
        assert_eq!(b.unwrap()["ok"], true);
        assert_eq!(store.access_token().as_deref(), Some("T2"));
    }

    #[tokio::test]
    async fn second_401_is_returned_without_second_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/leaderboard/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "nope"})))
            .expect(2)
            .mount(&server)
            .await;
        mount_refresh(&server, "T2", 1).await;

        let client = AuthClient::new(server.uri(), store_with("T1", "R1"));
        let response = client.send(&ApiRequest::get("/leaderboard/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn failed_refresh_surfaces_session_expired() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/leaderboard/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_with("T1", "R1");
        let client = AuthClient::new(server.uri(), Arc::clone(&store));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        client.refresher().on_session_expired(move |_| {
            let _ = counter.fetch_add(1, Ordering::SeqCst);
        });

        let err = client.get::<Value>("/leaderboard/").await.unwrap_err();
        assert_matches!(err, AuthError::SessionExpired(RefreshError::Rejected { status: 401, .. }));
        assert!(err.requires_reauthentication());
        assert!(!store.is_authenticated());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn signed_out_401_is_session_expired_without_refresh_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server, "T2", 0).await;

        let client = AuthClient::new(server.uri(), Arc::new(CredentialStore::in_memory()));
        let err = client.get::<Value>("/leaderboard/").await.unwrap_err();
        assert_matches!(err, AuthError::SessionExpired(RefreshError::NoRefreshToken));
    }

    #[tokio::test]
    async fn other_statuses_pass_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "forbidden"})))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server, "T2", 0).await;

        let client = AuthClient::new(server.uri(), store_with("T1", "R1"));
        let response = client.send(&ApiRequest::get("/x")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let err = client.get::<Value>("/x").await.unwrap_err();
        assert_matches!(err, AuthError::Server(_));
        assert_eq!(err.to_string(), "forbidden");
    }

    #[tokio::test]
    async fn multipart_retry_resends_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict/"))
            .and(header("authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/predict/"))
            .and(header("authorization", "Bearer T2"))
            .and(header_regex("content-type", "^multipart/form-data; boundary="))
            .and(|req: &Request| {
                String::from_utf8_lossy(&req.body).contains("name=\"image\"")
            })
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"label": "plastic"})))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server, "T2", 1).await;

        let client = AuthClient::new(server.uri(), store_with("T1", "R1"));
        let form = MultipartBody::new().file("image", "bottle.jpg", "image/jpeg", vec![0xFFu8, 0xD8]);
        let out: Value = client.post_multipart("/predict/", form).await.unwrap();
        assert_eq!(out["label"], "plastic");
    }

    #[tokio::test]
    async fn slow_response_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let settings = EcoVisionSettings::default();
        let client = AuthClient::with_http(
            http,
            server.uri(),
            &settings.auth,
            &settings.api.health_path,
            store_with("T1", "R1"),
        );
        let err = client.get::<Value>("/leaderboard/").await.unwrap_err();
        assert_matches!(err, AuthError::Timeout(_));
        assert!(!err.requires_reauthentication());
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_error() {
        let client = AuthClient::new("http://127.0.0.1:9", store_with("T1", "R1"));
        let err = client.get::<Value>("/leaderboard/").await.unwrap_err();
        assert_matches!(err, AuthError::NetworkUnreachable(_));
    }
}
