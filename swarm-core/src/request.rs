//! Request and response handles seen by hooks, injectors and handlers.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::dispatch::AppState;
use crate::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use crate::ApiError;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Type-erased method implementation.
pub type HandlerFn = Arc<dyn Fn(Args) -> BoxFuture<Result<Value, ApiError>> + Send + Sync>;

/// Box an async function into a [`HandlerFn`].
pub fn handler<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(f(args)))
}

/// An inbound request after the transport adapter has read it.
#[derive(Clone)]
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Route parameters, percent-decoded.
    pub params: HashMap<String, String>,
    pub query: Map<String, Value>,
    /// Parsed payload, `Null` when there is none or the method takes a raw body.
    pub body: Value,
    /// Unparsed payload; only kept for raw-body methods.
    pub raw_body: Option<Bytes>,
    /// Scopes granted to the caller; `None` means unauthenticated.
    pub scopes: Option<Vec<String>>,
    /// Negotiated language.
    pub lang: String,
    app: Option<Arc<AppState>>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("params", &self.params)
            .field("query", &self.query)
            .field("scopes", &self.scopes)
            .field("lang", &self.lang)
            .finish_non_exhaustive()
    }
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            params: HashMap::new(),
            query: Map::new(),
            body: Value::Null,
            raw_body: None,
            scopes: None,
            lang: String::new(),
            app: None,
        }
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_query(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.query.insert(name.to_string(), value.into());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_raw_body(mut self, raw: impl Into<Bytes>) -> Self {
        self.raw_body = Some(raw.into());
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The application this request is dispatched in.
    pub fn app(&self) -> Result<&Arc<AppState>, ApiError> {
        self.app
            .as_ref()
            .ok_or_else(|| ApiError::Internal("request is not attached to an application".into()))
    }

    pub(crate) fn attach(&mut self, app: Arc<AppState>) {
        self.app = Some(app);
    }

    pub(crate) fn headers_value(&self) -> Value {
        let mut out = Map::new();
        for (name, value) in &self.headers {
            if let Ok(value) = value.to_str() {
                out.insert(name.as_str().to_string(), Value::String(value.to_string()));
            }
        }
        Value::Object(out)
    }

    pub(crate) fn params_value(&self) -> Value {
        Value::Object(
            self.params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}

#[derive(Default)]
struct ReplyParts {
    status: Option<StatusCode>,
    headers: HeaderMap,
}

/// Response handle. Handlers use it to pick the status, headers and content
/// type; the returned value becomes the body.
#[derive(Clone, Default)]
pub struct Reply {
    inner: Arc<Mutex<ReplyParts>>,
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (status, headers) = self.parts();
        f.debug_struct("Reply")
            .field("status", &status)
            .field("headers", &headers)
            .finish()
    }
}

impl Reply {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_parts<R>(&self, f: impl FnOnce(&mut ReplyParts) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    pub fn status(&self, status: StatusCode) -> &Self {
        self.with_parts(|parts| parts.status = Some(status));
        self
    }

    pub fn header(&self, name: HeaderName, value: HeaderValue) -> &Self {
        self.with_parts(|parts| {
            parts.headers.insert(name, value);
        });
        self
    }

    /// Set the content type. String results of a non-JSON content type are
    /// written verbatim instead of as a JSON string.
    pub fn content_type(&self, mime: &str) -> &Self {
        if let Ok(value) = HeaderValue::from_str(mime) {
            self.header(crate::http::CONTENT_TYPE, value);
        }
        self
    }

    /// Snapshot of the status and headers set so far.
    pub fn parts(&self) -> (Option<StatusCode>, HeaderMap) {
        self.with_parts(|parts| (parts.status, parts.headers.clone()))
    }
}

/// One resolved handler argument.
#[derive(Clone, Debug)]
pub enum Arg {
    Value(Value),
    Raw(Bytes),
    Request(Arc<Request>),
    Response(Reply),
}

/// Positional handler arguments. Positions nothing was bound to, or whose
/// binding resolved to nothing, are empty.
#[derive(Clone, Debug, Default)]
pub struct Args(Vec<Option<Arg>>);

impl Args {
    pub fn new(slots: Vec<Option<Arg>>) -> Self {
        Args(slots)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Arg> {
        self.0.get(position).and_then(Option::as_ref)
    }

    pub fn value(&self, position: usize) -> Option<&Value> {
        match self.get(position) {
            Some(Arg::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn str(&self, position: usize) -> Option<&str> {
        self.value(position).and_then(Value::as_str)
    }

    /// Deserialize the value at `position`; an empty slot reads as `null`.
    pub fn json<T: DeserializeOwned>(&self, position: usize) -> Result<T, ApiError> {
        let value = self.value(position).cloned().unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    pub fn raw(&self, position: usize) -> Option<&Bytes> {
        match self.get(position) {
            Some(Arg::Raw(bytes)) => Some(bytes),
            _ => None,
        }
    }

    pub fn request(&self, position: usize) -> Option<&Arc<Request>> {
        match self.get(position) {
            Some(Arg::Request(request)) => Some(request),
            _ => None,
        }
    }

    pub fn response(&self, position: usize) -> Option<&Reply> {
        match self.get(position) {
            Some(Arg::Response(reply)) => Some(reply),
            _ => None,
        }
    }
}
