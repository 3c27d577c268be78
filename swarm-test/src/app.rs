use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_LANGUAGE, CONTENT_TYPE};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use swarm_core::http::{Body, Router};
use swarm_core::{AppState, Swarm, SwarmApp};
use tower::util::ServiceExt;

use crate::path::resolve_path;

/// In-process client for a built Swarm application.
///
/// Requests go through `tower::ServiceExt::oneshot`, so the full pipeline
/// (hooks, access gate, statistics) runs without binding a port.
pub struct TestApp {
    router: Router,
    state: Option<Arc<AppState>>,
}

impl TestApp {
    /// Wrap an already assembled router.
    pub fn new(router: Router) -> Self {
        Self {
            router,
            state: None,
        }
    }

    /// Build `swarm` and wrap the result.
    ///
    /// Panics when a registration hook fails.
    pub async fn from_swarm(swarm: Swarm) -> Self {
        let app = swarm
            .build_app()
            .await
            .unwrap_or_else(|e| panic!("failed to build the application: {e}"));
        Self::from_app(&app)
    }

    pub fn from_app(app: &SwarmApp) -> Self {
        Self {
            router: app.router().clone(),
            state: Some(app.state().clone()),
        }
    }

    /// Frozen application state. Only available for apps built through
    /// [`from_swarm`](Self::from_swarm) or [`from_app`](Self::from_app).
    pub fn state(&self) -> &Arc<AppState> {
        self.state
            .as_ref()
            .expect("TestApp was created from a bare router and has no state")
    }

    /// Flag the application as shutting down: later requests get a 503.
    pub fn begin_shutdown(&self) {
        self.state().begin_shutdown();
    }

    pub fn get(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::PUT, path)
    }

    pub fn patch(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::PATCH, path)
    }

    pub fn delete(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::DELETE, path)
    }

    pub fn request(&self, method: Method, path: &str) -> TestRequest<'_> {
        TestRequest {
            app: self,
            method,
            path: path.to_string(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// A request being built.
pub struct TestRequest<'a> {
    app: &'a TestApp,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl<'a> TestRequest<'a> {
    pub fn header(mut self, name: &str, value: impl AsRef<str>) -> Self {
        let name: HeaderName = name.parse().expect("invalid header name");
        let value = HeaderValue::from_str(value.as_ref()).expect("invalid header value");
        self.headers.append(name, value);
        self
    }

    /// Set `Accept-Language`.
    pub fn lang(self, lang: &str) -> Self {
        self.header(ACCEPT_LANGUAGE.as_str(), lang)
    }

    /// Append a query string pair. Repeating a key sends it several times.
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// JSON body, with `Content-Type: application/json`.
    pub fn json(mut self, body: &impl Serialize) -> Self {
        self.body = Some(serde_json::to_vec(body).expect("body is not serializable"));
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self
    }

    /// URL-encoded form body.
    pub fn form(mut self, pairs: &[(&str, &str)]) -> Self {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.body = Some(encoded.into_bytes());
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        self
    }

    /// Body sent as-is; set the content type with [`header`](Self::header).
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    fn uri(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.query)
            .finish();
        let separator = if self.path.contains('?') { '&' } else { '?' };
        format!("{}{separator}{query}", self.path)
    }

    pub async fn send(self) -> TestResponse {
        let mut request = Request::builder()
            .method(self.method.clone())
            .uri(self.uri())
            .body(self.body.map(Body::from).unwrap_or_else(Body::empty))
            .expect("invalid request");
        *request.headers_mut() = self.headers;

        let response = self
            .app
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("failed to read response body")
            .to_bytes();

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// A received response, with chainable assertions.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn assert_ok(self) -> Self {
        self.assert_status(StatusCode::OK)
    }

    pub fn assert_created(self) -> Self {
        self.assert_status(StatusCode::CREATED)
    }

    pub fn assert_bad_request(self) -> Self {
        self.assert_status(StatusCode::BAD_REQUEST)
    }

    pub fn assert_forbidden(self) -> Self {
        self.assert_status(StatusCode::FORBIDDEN)
    }

    pub fn assert_not_found(self) -> Self {
        self.assert_status(StatusCode::NOT_FOUND)
    }

    pub fn assert_unavailable(self) -> Self {
        self.assert_status(StatusCode::SERVICE_UNAVAILABLE)
    }

    pub fn assert_status(self, expected: impl TryInto<StatusCode>) -> Self {
        let expected = expected
            .try_into()
            .unwrap_or_else(|_| panic!("invalid expected status code"));
        assert_eq!(
            self.status,
            expected,
            "expected {expected}, got {}\nbody: {}",
            self.status,
            self.text()
        );
        self
    }

    /// Assert the `Content-Type` starts with `mime`.
    pub fn assert_content_type(self, mime: &str) -> Self {
        let actual = self.header(CONTENT_TYPE.as_str()).unwrap_or_default();
        assert!(
            actual.starts_with(mime),
            "expected content type {mime}, got {actual:?}"
        );
        self
    }

    /// Assert the value at a JSON path (`pets[0].name`, `pets.len()`).
    pub fn assert_json_path(self, path: &str, expected: impl Into<Value>) -> Self {
        let root: Value = self.json();
        let actual = resolve_path(&root, path);
        let expected = expected.into();
        assert_eq!(
            actual, expected,
            "JSON path {path:?} mismatch\n  expected: {expected}\n  actual:   {actual}\n  body: {root}"
        );
        self
    }

    pub fn json_path<T: DeserializeOwned>(&self, path: &str) -> T {
        let value = resolve_path(&self.json(), path);
        serde_json::from_value(value.clone())
            .unwrap_or_else(|e| panic!("cannot deserialize JSON path {path:?} ({value}): {e}"))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|e| panic!("body is not valid JSON: {e}\nbody: {}", self.text()))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
