//! Mounts [`Route`]s on an axum [`Router`] and converts between axum
//! requests/responses and the framework's [`Request`]/[`Reply`].

use std::collections::HashMap;

use bytes::Bytes;
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};
use tracing::warn;

use crate::dispatch::{Route, RouteHandler};
use crate::http::body::{to_bytes, Body};
use crate::http::header::{HeaderMap, HttpRequest};
use crate::http::response::{IntoResponse, Response};
use crate::http::routing::{on, MethodFilter, MethodRouter};
use crate::http::{Json, Router, StatusCode, ACCEPT_LANGUAGE, CONTENT_LENGTH, CONTENT_TYPE};
use crate::meta::HttpVerb;
use crate::request::{Reply, Request};
use crate::ApiError;

fn method_filter(verb: HttpVerb) -> MethodFilter {
    match verb {
        HttpVerb::Get => MethodFilter::GET,
        HttpVerb::Post => MethodFilter::POST,
        HttpVerb::Put => MethodFilter::PUT,
        HttpVerb::Patch => MethodFilter::PATCH,
        HttpVerb::Delete => MethodFilter::DELETE,
    }
}

/// `/users/:id` → `/users/{id}` (axum path syntax).
pub fn axum_path(url: &str) -> String {
    url.split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// `/users/:id` → `/users/:`. Templates with the same shape match the same
/// requests and must share one axum route.
pub fn route_shape(url: &str) -> String {
    url.split('/')
        .map(|segment| if segment.starts_with(':') { ":" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

/// Match a request path against a `:param` template and collect the
/// percent-decoded parameters.
pub fn extract_params(template: &str, path: &str) -> HashMap<String, String> {
    let path = if path.len() > 1 { path.trim_end_matches('/') } else { path };
    template
        .split('/')
        .zip(path.split('/'))
        .filter_map(|(pattern, value)| {
            let name = pattern.strip_prefix(':')?;
            let decoded = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            Some((name.to_string(), decoded))
        })
        .collect()
}

/// Query string as a JSON object. Repeated keys become arrays.
pub fn parse_query(query: Option<&str>) -> Map<String, Value> {
    let mut out = Map::new();
    let Some(query) = query else {
        return out;
    };
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        let value = Value::String(value.into_owned());
        match out.get_mut(key.as_ref()) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                out.insert(key.into_owned(), value);
            }
        }
    }
    out
}

/// Parse a payload according to its content type.
pub fn parse_body(content_type: Option<&str>, bytes: &Bytes) -> Result<Value, ApiError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if mime == "application/json" || mime.ends_with("+json") {
        serde_json::from_slice(bytes)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
    } else if mime == "application/x-www-form-urlencoded" {
        Ok(Value::Object(
            form_urlencoded::parse(bytes)
                .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
                .collect(),
        ))
    } else {
        Ok(Value::String(String::from_utf8_lossy(bytes).into_owned()))
    }
}

fn too_large(limit: usize) -> ApiError {
    ApiError::PayloadTooLarge(format!("Request body exceeds {limit} bytes"))
}

async fn read_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Bytes, ApiError> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(too_large(limit));
    }
    to_bytes(body, limit).await.map_err(|e| {
        let message = e.to_string();
        if e.into_inner().is::<LengthLimitError>() {
            too_large(limit)
        } else {
            ApiError::BadRequest(format!("Cannot read request body: {message}"))
        }
    })
}

async fn read_request(
    route: &RouteHandler,
    template: &str,
    req: HttpRequest<Body>,
) -> Result<Request, ApiError> {
    let (parts, body) = req.into_parts();
    let bytes = read_body(&parts.headers, body, route.state().options.body_limit).await?;

    let options = &route.state().options;
    let lang = options.negotiate_language(
        parts.headers.get(ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok()),
    );

    let mut request = Request::new(parts.method, parts.uri);
    request.params = extract_params(template, request.uri.path());
    request.query = parse_query(request.uri.query());
    request.lang = lang;
    if route.method().raw_body {
        request.raw_body = Some(bytes);
    } else {
        let content_type = parts.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        request.body = parse_body(content_type, &bytes)?;
    }
    request.headers = parts.headers;
    Ok(request)
}

fn render(value: Value, reply: &Reply) -> Response {
    let (status, headers) = reply.parts();
    let status = status.unwrap_or(StatusCode::OK);
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(true, |ct| ct.contains("json"));

    let mut response = match value {
        Value::String(text) if !is_json => (status, text).into_response(),
        Value::Null if status == StatusCode::NO_CONTENT => status.into_response(),
        value => (status, Json(value)).into_response(),
    };
    for (name, value) in headers.iter() {
        response.headers_mut().insert(name.clone(), value.clone());
    }
    response
}

async fn serve(route: RouteHandler, template: String, req: HttpRequest<Body>) -> Response {
    if route.state().is_shutting_down() {
        return ApiError::ServiceUnavailable("Server is shutting down".into()).into_response();
    }
    let request = match read_request(&route, &template, req).await {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    let reply = Reply::new();
    match route.handle(request, reply.clone()).await {
        Ok(value) => render(value, &reply),
        Err(err) => {
            let mut response = err.into_response();
            // Headers set before the failure still apply, minus the content type.
            let (_, headers) = reply.parts();
            for (name, value) in headers.iter().filter(|(n, _)| *n != CONTENT_TYPE) {
                response.headers_mut().insert(name.clone(), value.clone());
            }
            response
        }
    }
}

fn method_route(route: &Route) -> MethodRouter {
    let handler = route.handler.clone();
    let template = route.url.clone();
    on(method_filter(route.verb), move |req: HttpRequest<Body>| {
        let handler = handler.clone();
        let template = template.clone();
        async move { serve(handler, template, req).await }
    })
}

/// Mount routes on a fresh router.
///
/// Routes are grouped by [`route_shape`], so `GET /users/:id` and
/// `DELETE /users/:userId` share one method router while each handler keeps
/// its own template for parameter extraction. A later route for an already
/// mounted verb and shape replaces the earlier one.
pub fn mount(routes: &[Route]) -> Router {
    let mut by_shape: Vec<(String, Vec<&Route>)> = Vec::new();
    for route in routes {
        let shape = route_shape(&route.url);
        let index = match by_shape.iter().position(|(s, _)| *s == shape) {
            Some(index) => index,
            None => {
                by_shape.push((shape, Vec::new()));
                by_shape.len() - 1
            }
        };
        let verbs = &mut by_shape[index].1;
        if let Some(existing) = verbs.iter_mut().find(|r| r.verb == route.verb) {
            warn!(
                verb = %route.verb,
                url = %route.url,
                replaced = %existing.url,
                "Route registered twice, keeping the last one"
            );
            *existing = route;
        } else {
            verbs.push(route);
        }
    }

    let mut router = Router::new();
    for (shape, verbs) in by_shape {
        let mut method_router: Option<MethodRouter> = None;
        for route in verbs {
            let next = method_route(route);
            method_router = Some(match method_router {
                Some(existing) => existing.merge(next),
                None => next,
            });
        }
        if let Some(method_router) = method_router {
            router = router.route(&axum_shape(&shape), method_router);
        }
    }
    router
}

/// Axum path of a shape, with positional parameter names (`/users/{p1}`).
fn axum_shape(shape: &str) -> String {
    shape
        .split('/')
        .enumerate()
        .map(|(i, segment)| match segment {
            ":" => format!("{{p{i}}}"),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Add a fallback that retries a request without its trailing slash, so
/// `/health/` reaches `/health`.
pub fn with_trailing_slash_fallback(router: Router) -> Router {
    let inner = router.clone();
    router.fallback(move |req: HttpRequest<Body>| {
        let inner = inner.clone();
        async move {
            let path = req.uri().path();
            if path.len() > 1 && path.ends_with('/') {
                let trimmed = path.trim_end_matches('/');
                let trimmed = if trimmed.is_empty() { "/" } else { trimmed };
                let new_uri = match req.uri().query() {
                    Some(q) => format!("{trimmed}?{q}"),
                    None => trimmed.to_string(),
                };
                let (mut parts, body) = req.into_parts();
                parts.uri = new_uri.parse().unwrap_or(parts.uri);
                let new_req = HttpRequest::from_parts(parts, body);
                match tower::ServiceExt::oneshot(inner, new_req).await {
                    Ok(resp) => resp,
                    Err(infallible) => match infallible {},
                }
            } else {
                ApiError::NotFound(format!("Route {} not found", req.uri().path())).into_response()
            }
        }
    })
}
